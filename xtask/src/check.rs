use anyhow::{Context, Result};
use colored::Colorize;
use std::process::Command;
use std::time::Instant;

/// Embedded target the engine must keep building for.
const TARGET: &str = "thumbv7em-none-eabihf";

/// One `cargo` invocation: label and arguments.
struct Step {
    label: &'static str,
    args: &'static [&'static str],
    /// Report failures without aborting the run.
    advisory: bool,
}

const STEPS: &[Step] = &[
    Step {
        label: "codec (no_std)",
        args: &["check", "-p", "codec", "--target", TARGET, "--no-default-features"],
        advisory: false,
    },
    Step {
        label: "codec (no_std + defmt)",
        args: &["check", "-p", "codec", "--target", TARGET, "--features", "defmt"],
        advisory: false,
    },
    Step {
        label: "platform (no_std)",
        args: &["check", "-p", "platform", "--target", TARGET, "--no-default-features"],
        advisory: false,
    },
    Step {
        label: "host workspace",
        args: &["check", "--workspace", "--all-targets"],
        advisory: false,
    },
    Step {
        label: "clippy",
        args: &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
        advisory: true,
    },
    Step {
        label: "formatting",
        args: &["fmt", "--all", "--check"],
        advisory: true,
    },
];

pub fn run() -> Result<()> {
    println!();
    println!("{}", "🔍 Checking codec engine builds...".cyan().bold());
    println!();

    let total_start = Instant::now();

    for step in STEPS {
        println!("{}", format!("  Checking {}...", step.label).cyan());
        let start = Instant::now();

        let output = Command::new("cargo")
            .args(step.args)
            .output()
            .with_context(|| format!("Failed to run cargo for {}", step.label))?;

        if output.status.success() {
            println!(
                "{}",
                format!(
                    "  ✓ {} passed in {:.2}s",
                    step.label,
                    start.elapsed().as_secs_f64()
                )
                .green()
            );
        } else if step.advisory {
            eprintln!("{}", format!("  ⚠ {} reported issues", step.label).yellow().bold());
            eprintln!();
            eprintln!("{}", String::from_utf8_lossy(&output.stderr));
        } else {
            eprintln!("{}", format!("  ✗ {} failed", step.label).red().bold());
            eprintln!();
            eprintln!("{}", String::from_utf8_lossy(&output.stderr));
            anyhow::bail!("{} check failed", step.label);
        }
        println!();
    }

    println!(
        "{}",
        format!(
            "✓ All checks completed in {:.2}s",
            total_start.elapsed().as_secs_f64()
        )
        .green()
        .bold()
    );
    println!();

    Ok(())
}
