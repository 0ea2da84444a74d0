use funcagent_core::types::{CommandResult, FollowUp};
use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let header_row: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:width$}", h, width = widths[i]))
        .collect();
    println!("{}", header_row.join("  "));

    let sep: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", sep.join("  "));

    for row in &rows {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let w = widths.get(i).copied().unwrap_or(0);
                format!("{:width$}", cell, width = w)
            })
            .collect();
        println!("{}", cells.join("  ").trim_end());
    }
}

/// Human-readable rendering of a routed result.
pub fn print_result(result: &CommandResult) {
    println!("{}", result.response.trim_end());
    if !result.follow_ups.is_empty() {
        println!();
        println!("Suggestions:");
        for f in &result.follow_ups {
            match f {
                FollowUp::Reply { message } => println!("  > {message}"),
                FollowUp::Command { command_id, args } if args.is_empty() => println!("  [{command_id}]"),
                FollowUp::Command { command_id, args } => {
                    println!("  [{command_id}] {}", serde_json::Value::Object(args.clone()))
                }
            }
        }
    }
    println!();
    println!("(via {})", result.handler_chain.join(" > "));
}
