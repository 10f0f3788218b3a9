// Zoolab - Command line interface
// Seed a catalog, record captures and defeats, inspect unlock state

use anyhow::{Context, Result};
use clap::Parser;
use rusqlite::Connection;
use zoolab::config::{init_tracing, load_rule_book, Args, Command};
use zoolab::{
    apply_captures, db, get_events_for_entity, reset_progress, set_defeated, setup_database,
    Catalog, ChampionKind, RuleBook, UnlockEvent, UnlockReport,
};

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let mut conn = Connection::open(&args.database)
        .with_context(|| format!("Failed to open database {}", args.database.display()))?;
    setup_database(&conn).context("Failed to set up schema")?;

    let rules = load_rule_book(args.rules.as_ref()).context("Failed to load rule book")?;

    match args.command {
        Command::Init => {
            println!("🔧 Database ready: {}", args.database.display());
        }
        Command::Seed { catalog } => run_seed(&mut conn, &rules, &catalog)?,
        Command::Capture { updates } => {
            println!("🎯 Capture update");
            println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

            let outcome = apply_captures(&mut conn, &rules, &updates)?;
            for capture in &outcome.captures {
                println!("✓ {} {:+} → {}", capture.name, capture.delta, capture.capture_count);
            }
            print_report(&outcome.unlocks);
        }
        Command::Defeat { kind, id } => run_defeat(&mut conn, &rules, kind, id, true)?,
        Command::Undefeat { kind, id } => run_defeat(&mut conn, &rules, kind, id, false)?,
        Command::Reset => {
            reset_progress(&mut conn)?;
            println!("🧹 Progress reset: captures zeroed, all flags cleared");
        }
        Command::Status => run_status(&conn)?,
        Command::Events { kind, id } => {
            let events = get_events_for_entity(&conn, kind.reward_target(), &id.to_string())?;
            println!("📜 {} events for {} {}", events.len(), kind, id);
            for event in events {
                println!(
                    "  {}  {:<20} {:<18} {}",
                    event.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    event.event_type,
                    event.actor,
                    event.data
                );
            }
        }
    }

    Ok(())
}

fn run_seed(conn: &mut Connection, rules: &RuleBook, path: &std::path::Path) -> Result<()> {
    println!("📚 Seeding catalog");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let catalog = Catalog::from_file(path)
        .with_context(|| format!("Failed to read catalog {}", path.display()))?;
    let summary = catalog.install(conn, rules)?;

    println!("✓ {} zones", summary.zones);
    println!("✓ {} collectibles", summary.collectibles);
    println!("✓ {} area champions", summary.area_champions);
    println!("✓ {} species champions", summary.species_champions);
    println!("✓ {} prototypes", summary.prototypes);
    println!("✓ {} rewards", summary.rewards);

    Ok(())
}

fn run_defeat(
    conn: &mut Connection,
    rules: &RuleBook,
    kind: ChampionKind,
    id: i64,
    defeated: bool,
) -> Result<()> {
    let outcome = set_defeated(conn, rules, kind, id, defeated)?;

    if outcome.defeated {
        println!("⚔️  {} {} defeated", outcome.kind, outcome.name);
    } else {
        println!("↩️  {} {} no longer defeated", outcome.kind, outcome.name);
    }
    if let Some(capstone) = &outcome.capstone {
        print_event(capstone);
    }

    Ok(())
}

fn run_status(conn: &Connection) -> Result<()> {
    println!("📊 Zone progress");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for progress in db::get_zone_progress(conn)? {
        println!(
            "  {:<24} {:>3}/{:<3} {}",
            progress.zone.name,
            progress.captured,
            progress.total,
            progress.status().as_str()
        );
    }

    for kind in ChampionKind::ALL {
        println!("\n🏆 {}", kind.table());
        for entity in db::get_unlockables(conn, kind)? {
            println!(
                "  {:<4} {:<24} {} {}",
                entity.id,
                entity.name,
                if entity.created { "✅ created" } else { "·  locked " },
                if entity.defeated { "⚔️  defeated" } else { "" }
            );
        }
    }

    Ok(())
}

fn print_report(report: &UnlockReport) {
    if report.is_empty() {
        println!("\n(no unlock changes)");
        return;
    }

    println!();
    for event in report.events() {
        print_event(event);
    }
}

fn print_event(event: &UnlockEvent) {
    match &event.reward {
        Some(reward) if event.created => println!(
            "🎉 {} created (reward: {} x{})",
            event.name, reward.item, reward.quantity
        ),
        _ if event.created => println!("🎉 {} created", event.name),
        _ => println!("❌ {} retracted", event.name),
    }
}
