//! Status command - show audit pipe queue and preselection state.

use aupipe::{AuditPipe, Result};
use clap::Args;

#[derive(Args)]
pub struct StatusArgs {}

pub fn run(_args: StatusArgs, json: bool) -> Result<()> {
    let pipe = AuditPipe::open()?;

    let qlen = pipe.qlen()?;
    let qlimit = pipe.qlimit()?;
    let qlimit_min = pipe.qlimit_min()?;
    let qlimit_max = pipe.qlimit_max()?;
    let max_audit_data = pipe.max_audit_data()?;
    let mode = pipe.preselect_mode()?;
    let flags = pipe.preselect_flags()?;
    let naflags = pipe.preselect_naflags()?;

    if json {
        let output = serde_json::json!({
            "qlen": qlen,
            "qlimit": qlimit,
            "qlimit_min": qlimit_min,
            "qlimit_max": qlimit_max,
            "max_audit_data": max_audit_data,
            "mode": format!("{:?}", mode),
            "flags": { "success": flags.success, "failure": flags.failure },
            "naflags": { "success": naflags.success, "failure": naflags.failure },
        });
        println!("{}", serde_json::to_string_pretty(&output).unwrap());
    } else {
        println!("queue length:     {qlen}");
        println!("queue limit:      {qlimit} (allowed {qlimit_min}..{qlimit_max})");
        println!("max record size:  {max_audit_data}");
        println!("preselect mode:   {mode:?}");
        println!(
            "preselect flags:  success {:#010x} failure {:#010x}",
            flags.success, flags.failure
        );
        println!(
            "naflags:          success {:#010x} failure {:#010x}",
            naflags.success, naflags.failure
        );
    }
    Ok(())
}
