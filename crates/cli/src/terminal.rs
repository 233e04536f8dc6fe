use std::io::{self, Write};

use anyhow::Result;
use chrono::{DateTime, Utc};
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};

use cadence_core::format_duration;
use cadence_scheduler::{ClaimReceipt, Evaluation, Inventory, ScheduleSnapshot, SchedulerEvent, SlotState};

/// Color scheme for terminal output.
struct Colors;

impl Colors {
    const HEADER: Color = Color::Magenta;
    const CLAIMABLE: Color = Color::Green;
    const CLAIMED: Color = Color::Cyan;
    const MISSED: Color = Color::Yellow;
    const ERROR: Color = Color::Red;
    const DIM: Color = Color::DarkGrey;

    fn for_state(state: SlotState) -> Color {
        match state {
            SlotState::Claimable => Self::CLAIMABLE,
            SlotState::Claimed => Self::CLAIMED,
            SlotState::Missed => Self::MISSED,
            SlotState::Locked => Self::DIM,
        }
    }
}

/// Writes human-readable output to stdout.
pub struct Terminal;

impl Terminal {
    pub fn new() -> Self {
        Self
    }

    /// One line per schedule with a compact state strip.
    pub fn print_schedules(&self, snapshots: &[ScheduleSnapshot]) -> Result<()> {
        let mut stdout = io::stdout();
        if snapshots.is_empty() {
            execute!(
                stdout,
                SetForegroundColor(Colors::DIM),
                Print("No schedules loaded.\n"),
                ResetColor,
            )?;
            return Ok(());
        }

        execute!(
            stdout,
            SetForegroundColor(Colors::HEADER),
            Print(format!("{:<24} {:<28} {}\n", "SCHEDULE", "NAME", "SLOTS")),
            ResetColor,
        )?;
        for snapshot in snapshots {
            execute!(
                stdout,
                Print(format!("{:<24} {:<28} ", snapshot.key(), snapshot.name())),
            )?;
            for state in snapshot.evaluation.states.values() {
                execute!(
                    stdout,
                    SetForegroundColor(Colors::for_state(*state)),
                    Print(state_glyph(*state)),
                    ResetColor,
                )?;
            }
            execute!(
                stdout,
                SetForegroundColor(Colors::DIM),
                Print(format!("  {}\n", countdown(&snapshot.evaluation, snapshot.evaluated_at))),
                ResetColor,
            )?;
        }
        stdout.flush()?;
        Ok(())
    }

    /// Full per-slot view of one schedule.
    pub fn print_status(&self, snapshot: &ScheduleSnapshot) -> Result<()> {
        let mut stdout = io::stdout();
        let config = &snapshot.config;
        let expiration = match config.expiration_seconds() {
            0 => "never".to_string(),
            secs => format_duration(u64::from(secs)),
        };

        execute!(
            stdout,
            SetForegroundColor(Colors::HEADER),
            Print(format!("{} ({})\n", snapshot.name(), snapshot.key())),
            ResetColor,
            SetForegroundColor(Colors::DIM),
            Print(format!(
                "cooldown {} | expires {} | reset on expire: {}\n",
                format_duration(u64::from(config.cooldown_seconds())),
                expiration,
                if config.reset_on_expire() { "yes" } else { "no" },
            )),
            Print(format!("{}\n", "-".repeat(60))),
            ResetColor,
        )?;
        self.print_slot_table(snapshot)?;
        execute!(
            stdout,
            SetForegroundColor(Colors::DIM),
            Print(format!("{}\n", countdown(&snapshot.evaluation, snapshot.evaluated_at))),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    fn print_slot_table(&self, snapshot: &ScheduleSnapshot) -> Result<()> {
        let mut stdout = io::stdout();
        for slot in snapshot.config.slots() {
            let state = snapshot.state_of(&slot.key).unwrap_or(SlotState::Locked);
            let claimed = snapshot
                .claims
                .iter()
                .find(|(key, _)| *key == slot.key)
                .map(|(_, at)| at.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default();
            let grants = slot
                .payout
                .grants
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");

            execute!(
                stdout,
                Print(format!("  {:<16} ", slot.key)),
                SetForegroundColor(Colors::for_state(state)),
                Print(format!("{:<10}", state.to_string())),
                ResetColor,
                Print(format!(" {:<20} {}\n", claimed, grants)),
            )?;
        }
        Ok(())
    }

    /// Outcome of evaluating persisted history at a chosen instant.
    pub fn print_preview(&self, snapshot: &ScheduleSnapshot) -> Result<()> {
        let mut stdout = io::stdout();
        let verdict = if snapshot.evaluation.did_reset {
            "a reset is due: the cycle restarts at the first slot"
        } else {
            "no reset is due"
        };
        execute!(
            stdout,
            SetForegroundColor(Colors::HEADER),
            Print(format!(
                "{} at {}\n",
                snapshot.key(),
                snapshot.evaluated_at.format("%Y-%m-%d %H:%M:%S UTC")
            )),
            ResetColor,
            Print(format!("{}\n", verdict)),
        )?;
        self.print_slot_table(snapshot)?;
        stdout.flush()?;
        Ok(())
    }

    pub fn print_receipt(&self, receipt: &ClaimReceipt) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::CLAIMABLE),
            Print(format!("Claimed {} / {}", receipt.schedule_key, receipt.slot_key)),
            ResetColor,
            Print(format!(": {}\n", receipt.payout.summary())),
            SetForegroundColor(Colors::DIM),
            Print(format!("receipt {}\n", receipt.id)),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    pub fn print_inventory(&self, inventory: &Inventory) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(stdout, SetForegroundColor(Colors::HEADER), Print("Wallet\n"), ResetColor)?;
        for (currency, amount) in &inventory.currencies {
            execute!(stdout, Print(format!("  {:<20} {}\n", currency, amount)))?;
        }
        execute!(stdout, SetForegroundColor(Colors::HEADER), Print("Items\n"), ResetColor)?;
        for (item, quantity) in &inventory.stacks {
            execute!(stdout, Print(format!("  {:<20} x{}\n", item, quantity)))?;
        }
        for item in &inventory.unit_items {
            execute!(stdout, Print(format!("  {}\n", item)))?;
        }
        stdout.flush()?;
        Ok(())
    }

    pub fn print_event(&self, event: &SchedulerEvent) -> Result<()> {
        let mut stdout = io::stdout();
        let (color, line) = match event {
            SchedulerEvent::ClaimInitiated { schedule, slot } => {
                (Colors::DIM, format!("claiming {} / {}", schedule, slot))
            }
            SchedulerEvent::ClaimProgressed { step, total_steps, .. } => (
                Colors::DIM,
                format!("  [{}/{}] {:?}", step.number(), total_steps, step),
            ),
            SchedulerEvent::ClaimSucceeded { schedule, slot, .. } => {
                (Colors::CLAIMABLE, format!("claimed {} / {}", schedule, slot))
            }
            SchedulerEvent::ClaimFailed { schedule, slot, error, .. } => {
                (Colors::ERROR, format!("claim {} / {} failed: {}", schedule, slot, error))
            }
            SchedulerEvent::ScheduleReset { schedule } => {
                (Colors::MISSED, format!("{} reset to its first slot", schedule))
            }
            SchedulerEvent::ScheduleStateChanged { schedule } => {
                (Colors::HEADER, format!("{} changed", schedule))
            }
        };
        execute!(
            stdout,
            SetForegroundColor(color),
            Print(format!("{}\n", line)),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    pub fn print_info(&self, msg: &str) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::DIM),
            Print(format!("{}\n", msg)),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    pub fn print_error(&self, msg: &str) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::ERROR),
            Print(format!("error: {}\n", msg)),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }
}

fn state_glyph(state: SlotState) -> &'static str {
    match state {
        SlotState::Claimable => "●",
        SlotState::Claimed => "✓",
        SlotState::Missed => "✗",
        SlotState::Locked => "·",
    }
}

/// "next change in 3h 20m" style hint from the evaluation.
fn countdown(evaluation: &Evaluation, now: DateTime<Utc>) -> String {
    match evaluation.next_recompute_at {
        Some(at) => {
            let secs = (at - now).num_seconds().max(0) as u64;
            format!("next change in {}", format_duration(secs))
        }
        None if evaluation.claimable_count() > 0 => "ready to claim".to_string(),
        None => "waiting".to_string(),
    }
}
