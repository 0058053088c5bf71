use colored::Colorize;
use tracing::info;

use crate::cli::*;
use crate::config::CliConfig;
use crate::script::{Script, Session, SessionReport};

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Run(args) => cmd_run(args, cli.format),
        Command::Config(args) => cmd_config(args),
    }
}

fn cmd_run(args: RunArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = CliConfig::load_or_default(args.config.as_deref())?;
    let script = Script::load(&args.script)?;
    info!(script = %args.script.display(), steps = script.steps.len(), "running script");

    let report = Session::new(&config, &script)?.run(&script)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_report(&report),
    }

    if !report.audit.is_valid() {
        anyhow::bail!("ledger audit found {} violation(s)", report.audit.violations.len());
    }
    Ok(())
}

fn cmd_config(args: ConfigArgs) -> anyhow::Result<()> {
    let config = CliConfig::load_or_default(args.config.as_deref())?;
    print!("{}", config.to_toml()?);
    Ok(())
}

fn print_report(report: &SessionReport) {
    println!("{}", "Steps".bold());
    for outcome in &report.outcomes {
        let mark = if outcome.ok { "✓".green() } else { "✗".red() };
        let detail = if outcome.ok {
            outcome.detail.normal()
        } else {
            outcome.detail.red()
        };
        println!(
            "  {} {:>3} {:<8} {}",
            mark,
            outcome.step,
            outcome.op.cyan(),
            detail
        );
    }

    if !report.events.is_empty() {
        println!("\n{}", "Events".bold());
        for event in &report.events {
            println!(
                "  {} {} {} {}",
                format!("#{}", event.seq).dimmed(),
                event.kind.to_string().yellow(),
                event.receiver.short_id(),
                event.id.to_string().dimmed()
            );
        }
    }

    println!("\n{}", "Programs".bold());
    if report.programs.is_empty() {
        println!("  (none)");
    }
    for program in &report.programs {
        println!(
            "  {} {} [{}] collected {} from {} donation(s), deadline {}",
            program.index.to_string().yellow(),
            program.title.bold(),
            program.status,
            program.collected.to_string().green(),
            program.donation_count,
            program.deadline
        );
    }

    if !report.balances.is_empty() {
        println!("\n{}", "Balances".bold());
        for (name, balance) in &report.balances {
            println!("  {:<16} {}", name, balance);
        }
    }

    let audit = &report.audit;
    println!(
        "\nAudit: {} program(s), {} active, {} in escrow, {}",
        audit.program_count,
        audit.active_count,
        audit.escrow_total,
        if audit.is_valid() {
            "✓ consistent".green().bold()
        } else {
            "✗ violations".red().bold()
        }
    );
    for violation in &audit.violations {
        println!(
            "  {} {:?}: {}",
            violation.index.to_string().red(),
            violation.kind,
            violation.description
        );
    }
}
