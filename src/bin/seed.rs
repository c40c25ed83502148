use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;

use vidaplus::config::Settings;
use vidaplus::seed;
use vidaplus::store::{PgStore, build_pool, run_migrations};
use vidaplus::telemetry;

#[derive(Parser)]
#[command(name = "vidaplus-seed", about = "Loads demo data into the VidaPlus database")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Demo users, patients, staff, medications and appointments
    Base,
    /// Generated nurses and technicians
    NonDoctors {
        #[arg(long, default_value_t = 10)]
        count: usize,
    },
    /// Five days of appointments for the demo doctor
    DoctorAgenda,
    /// Every step above, in order
    All {
        #[arg(long, default_value_t = 10)]
        count: usize,
    },
}

fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    let settings = Settings::load().context("failed to load configuration")?;
    telemetry::init(settings.log.json);

    let pool = build_pool(&settings.database.url, settings.database.max_connections)?;
    if settings.database.run_migrations {
        run_migrations(&pool)?;
    }
    let store = PgStore::new(pool);
    let today = chrono::Local::now().date_naive();
    let mut rng = rand::thread_rng();

    match cli.command {
        Commands::Base => seed::base(&store),
        Commands::NonDoctors { count } => seed::non_doctors(&store, count, &mut rng).map(|_| ()),
        Commands::DoctorAgenda => seed::doctor_agenda(&store, today).map(|_| ()),
        Commands::All { count } => seed::all(&store, count, today, &mut rng),
    }
}
