use std::io::{self, Write};

use anyhow::Result;
use azca_rules::{RuleOutcome, ScanResult};
use crossterm::{
    queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor},
};

/// Color scheme for terminal output.
struct Colors;

impl Colors {
    const RULE: Color = Color::Magenta;
    const PASS: Color = Color::Green;
    const FAIL: Color = Color::Red;
    const FIX: Color = Color::Yellow;
    const DIM: Color = Color::DarkGrey;
}

/// Totals over one scan.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub passing: usize,
    pub failing: usize,
    pub errored: usize,
}

impl Summary {
    pub fn of(outcomes: &[RuleOutcome]) -> Self {
        outcomes.iter().fold(Self::default(), |mut summary, outcome| {
            match &outcome.result {
                Ok(result) if result.passed() => summary.passing += 1,
                Ok(_) => summary.failing += 1,
                Err(_) => summary.errored += 1,
            }
            summary
        })
    }

    pub fn scanned(&self) -> usize {
        self.passing + self.failing + self.errored
    }
}

/// Renders scan results to stdout and notices to stderr.
pub struct Terminal;

impl Terminal {
    pub fn new() -> Self {
        Self
    }

    /// Print every rule outcome followed by the summary line.
    pub fn print_outcomes(&self, outcomes: &[RuleOutcome]) -> Result<()> {
        let mut stdout = io::stdout();
        write_outcomes(&mut stdout, outcomes)?;
        stdout.flush()?;
        Ok(())
    }

    pub fn print_warning(&self, msg: &str) -> Result<()> {
        let mut stderr = io::stderr();
        queue!(
            stderr,
            SetForegroundColor(Colors::FIX),
            Print(format!("Warning: {}\n", msg)),
            ResetColor,
        )?;
        stderr.flush()?;
        Ok(())
    }

    pub fn print_info(&self, msg: &str) -> Result<()> {
        let mut stderr = io::stderr();
        queue!(
            stderr,
            SetForegroundColor(Colors::DIM),
            Print(format!("{}\n", msg)),
            ResetColor,
        )?;
        stderr.flush()?;
        Ok(())
    }
}

pub fn write_outcomes<W: Write>(out: &mut W, outcomes: &[RuleOutcome]) -> io::Result<()> {
    for outcome in outcomes {
        queue!(
            out,
            SetForegroundColor(Colors::RULE),
            SetAttribute(Attribute::Bold),
            Print(format!("{}\n", outcome.rule_name)),
            SetAttribute(Attribute::Reset),
            ResetColor,
        )?;
        match &outcome.result {
            Ok(result) => write_result(out, result)?,
            Err(e) => queue!(
                out,
                SetForegroundColor(Colors::FAIL),
                Print(format!("  ❌ rule could not be evaluated: {}\n", e)),
                ResetColor,
            )?,
        }
        queue!(out, Print("\n"))?;
    }

    let summary = Summary::of(outcomes);
    queue!(
        out,
        SetForegroundColor(Colors::PASS),
        Print(format!("{} passing", summary.passing)),
        ResetColor,
        Print(", "),
        SetForegroundColor(Colors::FAIL),
        Print(format!("{} failing", summary.failing)),
        ResetColor,
    )?;
    if summary.errored > 0 {
        queue!(
            out,
            Print(", "),
            SetForegroundColor(Colors::FAIL),
            Print(format!("{} errored", summary.errored)),
            ResetColor,
        )?;
    }
    queue!(
        out,
        SetForegroundColor(Colors::DIM),
        Print(format!(" ({} rules scanned)\n", summary.scanned())),
        ResetColor,
    )?;
    Ok(())
}

fn write_result<W: Write>(out: &mut W, result: &ScanResult) -> io::Result<()> {
    if result.passed() {
        return queue!(
            out,
            SetForegroundColor(Colors::PASS),
            Print(format!("  ✓ {}\n", result.description())),
            ResetColor,
        );
    }

    queue!(
        out,
        SetForegroundColor(Colors::FAIL),
        Print(format!("  ❌ {}\n", result.description())),
        ResetColor,
    )?;
    if let Some(fix) = result.recommendation() {
        queue!(
            out,
            SetForegroundColor(Colors::FIX),
            Print("  How to Fix: "),
            ResetColor,
            Print(format!("{}\n", fix)),
        )?;
    }
    queue!(out, Print(format!("  Resources ({}):\n", result.total())))?;
    for id in result.resource_ids() {
        queue!(
            out,
            SetForegroundColor(Colors::DIM),
            Print("    - "),
            ResetColor,
            Print(format!("{}\n", id)),
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use azca_rules::{Evaluation, Rule, ScanError};

    fn outcome(rule: &Rule, ids: &[&str]) -> RuleOutcome {
        RuleOutcome {
            rule_name: rule.name.clone(),
            result: Ok(ScanResult::new(rule, ids.iter().map(|s| s.to_string()).collect())),
        }
    }

    fn render(outcomes: &[RuleOutcome]) -> String {
        let mut buf = Vec::new();
        write_outcomes(&mut buf, outcomes).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn failing_rule_lists_fix_and_resources() {
        let rule = Rule::new("public-storage", "Storage allows public traffic", Evaluation::leaf("type == 'x'"))
            .with_recommendation("Set defaultAction to Deny");
        let text = render(&[outcome(&rule, &["sa1", "sa2"])]);

        assert!(text.contains("public-storage"));
        assert!(text.contains("❌ Storage allows public traffic"));
        assert!(text.contains("How to Fix: "));
        assert!(text.contains("Set defaultAction to Deny"));
        assert!(text.contains("Resources (2):"));
        assert!(text.contains("sa1\n"));
        assert!(text.contains("0 passing"));
        assert!(text.contains("1 failing"));
        assert!(text.contains("(1 rules scanned)"));
    }

    #[test]
    fn passing_rule_shows_check_mark_only() {
        let rule = Rule::new("clean", "Nothing to see", Evaluation::leaf("type == 'x'"))
            .with_recommendation("never shown");
        let text = render(&[outcome(&rule, &[])]);

        assert!(text.contains("✓ Nothing to see"));
        assert!(!text.contains("How to Fix"));
        assert!(!text.contains("Resources ("));
        assert!(text.contains("1 passing"));
    }

    #[test]
    fn errored_rules_are_counted_separately() {
        let ok = Rule::new("ok", "fine", Evaluation::leaf("type == 'x'"));
        let outcomes = vec![
            outcome(&ok, &[]),
            RuleOutcome {
                rule_name: "broken".to_string(),
                result: Err(ScanError::MissingIdColumn {
                    rule: "broken".to_string(),
                }),
            },
        ];

        let text = render(&outcomes);
        assert!(text.contains("rule could not be evaluated"));
        assert!(text.contains("1 errored"));
        assert!(text.contains("(2 rules scanned)"));
        assert_eq!(
            Summary::of(&outcomes),
            Summary {
                passing: 1,
                failing: 0,
                errored: 1
            }
        );
    }
}
