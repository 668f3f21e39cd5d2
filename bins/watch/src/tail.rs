//! Tail command - stream audit records as they are emitted.

use aupipe::stream::RecordStream;
use aupipe::{AuMask, AuditPipe, ClassTable, EventTable, Result};
use clap::Args;

#[derive(Args)]
pub struct TailArgs {
    /// Audit classes to preselect, by mnemonic
    #[arg(short, long, default_value = "all", value_delimiter = ',')]
    pub class: Vec<String>,
}

pub async fn run(args: TailArgs, json: bool) -> Result<()> {
    let classes = ClassTable::load()?;
    let events = EventTable::load()?;

    let mut mask = AuMask::default();
    for name in &args.class {
        let one = classes.resolve(name)?;
        mask.success |= one.success;
        mask.failure |= one.failure;
    }

    let mut pipe = AuditPipe::open()?;
    pipe.prime(mask)?;

    eprintln!("Tailing audit records (classes: {})...", args.class.join(","));
    eprintln!("Press Ctrl+C to stop.");

    let mut stream = RecordStream::new(pipe)?;
    loop {
        let record = stream.next_record().await?;
        if json {
            println!("{}", serde_json::to_string(&record).unwrap());
        } else {
            println!("{}", record.render(&events));
        }
    }
}
