//! Classes command - list the audit classes known to this host.

use aupipe::{ClassTable, Result};
use clap::Args;

#[derive(Args)]
pub struct ClassesArgs {}

pub fn run(_args: ClassesArgs, json: bool) -> Result<()> {
    let classes = ClassTable::load()?;

    if json {
        let entries: Vec<_> = classes
            .iter()
            .map(|c| {
                serde_json::json!({
                    "mask": c.mask,
                    "name": c.name,
                    "description": c.description,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries).unwrap());
    } else {
        for class in classes.iter() {
            println!("{:#010x}  {:<4} {}", class.mask, class.name, class.description);
        }
    }
    Ok(())
}
