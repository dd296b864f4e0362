use anyhow::{Context, Result};
use colored::Colorize;
use std::process::Command;
use std::time::Instant;

/// Crates whose API docs are published.
const CRATES: &[&str] = &["codec", "platform"];

pub fn run(open: bool) -> Result<()> {
    println!();
    println!("{}", "📚 Building API documentation...".cyan().bold());
    println!();

    let start = Instant::now();

    let mut cmd = Command::new("cargo");
    cmd.arg("doc").arg("--no-deps");
    for krate in CRATES {
        cmd.args(["-p", krate]);
    }
    // Broken intra-doc links fail the build.
    cmd.env("RUSTDOCFLAGS", "-D rustdoc::broken_intra_doc_links");
    if open {
        cmd.arg("--open");
    }

    let output = cmd.output().context("Failed to run cargo doc")?;

    if !output.status.success() {
        eprintln!("{}", "✗ Documentation build failed".red().bold());
        eprintln!();
        eprintln!("{}", String::from_utf8_lossy(&output.stderr));
        anyhow::bail!("Documentation build failed");
    }

    println!(
        "{}",
        format!("✓ Documentation built in {:.2}s", start.elapsed().as_secs_f64()).green()
    );
    if !open {
        for krate in CRATES {
            println!("   {}", format!("target/doc/{krate}/index.html").dimmed());
        }
    }
    println!();

    Ok(())
}
