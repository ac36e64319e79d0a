//! MIDI endpoint listing for `--list-ports`

use anyhow::Result;
use colored::*;

use crate::midi::{Direction, MidiBackend};

/// One enumerated endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub index: usize,
    pub name: String,
    pub matches: bool,
}

/// Enumerate endpoints in one direction, flagging those containing `token`
pub fn discover(backend: &impl MidiBackend, direction: Direction, token: &str) -> Result<Vec<PortInfo>> {
    let names = match direction {
        Direction::Input => backend.input_names()?,
        Direction::Output => backend.output_names()?,
    };

    Ok(names
        .into_iter()
        .enumerate()
        .map(|(index, name)| PortInfo {
            index,
            matches: name.contains(token),
            name,
        })
        .collect())
}

/// Print input and output endpoints, highlighting the switcher's
pub fn print_ports(backend: &impl MidiBackend, token: &str) -> Result<()> {
    println!("\n{}", "=== MIDI Ports ===".bold().cyan());

    for (direction, title) in [(Direction::Input, "Input ports:"), (Direction::Output, "Output ports:")] {
        println!("\n{}", title.bold());
        let ports = discover(backend, direction, token)?;
        if ports.is_empty() {
            println!("  {}", "(none)".dimmed());
        }
        for port in ports {
            let line = format!("  [{}] {}", port.index, port.name);
            if port.matches {
                println!("{} {}", line.green(), format!("<- {}", token).yellow());
            } else {
                println!("{}", line);
            }
        }
    }

    println!();
    Ok(())
}
