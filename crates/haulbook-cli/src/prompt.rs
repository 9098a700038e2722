//! Terminal input helpers.

use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::{bail, Context, Result};
use haulbook_core::models::RecordInput;

/// Maximum length for username input
const MAX_USERNAME_LENGTH: usize = 150;

pub fn is_interactive() -> bool {
    io::stdin().is_terminal()
}

/// Read one line. An empty answer yields `default` when one is given.
pub fn line(label: &str, default: Option<&str>) -> Result<String> {
    match default {
        Some(d) if !d.is_empty() => print!("{} [{}]: ", label, d),
        _ => print!("{}: ", label),
    }
    io::stdout().flush()?;

    answer(&mut io::stdin().lock(), default)
}

/// Fail with a clear message when stdin is not a terminal
pub fn require_interactive(action: &str) -> Result<()> {
    if !is_interactive() {
        bail!("{} needs an interactive terminal", action);
    }
    Ok(())
}

fn answer<R: BufRead>(reader: &mut R, default: Option<&str>) -> Result<String> {
    let mut input = String::new();
    let read = reader
        .read_line(&mut input)
        .context("Failed to read input")?;
    if read == 0 {
        bail!("Input closed");
    }
    let input = input.trim();

    if input.is_empty() {
        Ok(default.unwrap_or_default().to_string())
    } else {
        Ok(input.to_string())
    }
}

pub fn username(default: Option<&str>) -> Result<String> {
    loop {
        let name = line("Username", default)?;
        if name.is_empty() {
            eprintln!("Username is required.");
        } else if name.len() > MAX_USERNAME_LENGTH {
            eprintln!("Username is too long.");
        } else {
            return Ok(name);
        }
    }
}

pub fn password(label: &str) -> Result<String> {
    rpassword::prompt_password(format!("{}: ", label)).context("Failed to read password")
}

pub fn confirm(question: &str) -> Result<bool> {
    let answer = line(&format!("{} (y/N)", question), None)?;
    Ok(matches!(answer.to_lowercase().as_str(), "y" | "yes"))
}

fn decimal(label: &str, default: Option<f64>) -> Result<f64> {
    let default_text = default.map(|d| format!("{:.2}", d));
    loop {
        let raw = line(label, default_text.as_deref())?;
        if raw.is_empty() {
            return Ok(0.0);
        }
        match raw.trim_start_matches('$').replace(',', "").parse::<f64>() {
            Ok(v) if v >= 0.0 => return Ok(v),
            _ => eprintln!("Enter a non-negative number."),
        }
    }
}

/// Fill in a record form, starting from `existing` when editing
pub fn record_form(existing: Option<&RecordInput>) -> Result<RecordInput> {
    let date = loop {
        let default = existing.map(|r| r.date.to_string());
        let raw = line("Date (YYYY-MM-DD)", default.as_deref())?;
        match raw.parse() {
            Ok(date) => break date,
            Err(_) => eprintln!("Enter a date like 2024-05-14."),
        }
    };

    Ok(RecordInput {
        date,
        po_number: line("PO number", existing.map(|r| r.po_number.as_str()))?,
        location_from: line("From", existing.map(|r| r.location_from.as_str()))?,
        location_to: line("To", existing.map(|r| r.location_to.as_str()))?,
        dh_miles: decimal("DH miles", existing.map(|r| r.dh_miles))?,
        miles: decimal("Miles", existing.map(|r| r.miles))?,
        fuel: decimal("Fuel", existing.map(|r| r.fuel))?,
        food: decimal("Food", existing.map(|r| r.food))?,
        lumper: decimal("Lumper", existing.map(|r| r.lumper))?,
        pay: decimal("Pay", existing.map(|r| r.pay))?,
    })
}
