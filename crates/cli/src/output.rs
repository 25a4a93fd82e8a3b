use crate::error::CliError;
use model::{records::batch::BatchRecord, replication::status::ReplicationStatus};
use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}

fn or_na<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "n/a".to_string())
}

pub fn print_batch_table(batch: &BatchRecord) {
    println!("Batch {}:", batch.key);
    println!("-----------------------------");
    println!("{:<16} {}", "Ledger id", batch.id);
    println!("{:<16} {}", "Status", batch.status);
    println!("{:<16} {}", "Row count", batch.row_count);
    println!("{:<16} {}", "Start marker", or_na(batch.start_marker));
    println!("{:<16} {}", "End marker", or_na(batch.end_marker));
    println!("{:<16} {}", "Created", batch.created_at.to_rfc3339());
    println!(
        "{:<16} {}",
        "Completed",
        or_na(batch.completion_timestamp.map(|ts| ts.to_rfc3339()))
    );
}

pub fn print_status_table(entity: &str, status: &ReplicationStatus) {
    println!("Latest batch for {entity}:");
    println!("-----------------------------");
    println!("{:<16} {}", "Batch id", status.batch_id);
    println!("{:<16} {}", "Status", status.status);
    println!("{:<16} {}", "Row count", status.row_count);
    println!("{:<16} {}", "End marker", or_na(status.end_marker));
    println!("{:<16} {}", "Slots", status.slots.slot_names.join(", "));
    println!("{:<16} {}", "Confirmed", or_na(status.slots.confirmed_position));
    println!("{:<16} {}", "Caught up", status.caught_up);
    println!(
        "{:<16} {}",
        "Since completed",
        or_na(status.since_completion.map(|d| format!("{}s", d.as_secs())))
    );
}
