use clap::{Parser, Subcommand};

use clinicdw::metrics::{CategoryShare, PeriodTotals, ProjectionResult};
use clinicdw::{ClinicDW, Month, ReportFilter, ReportMetric, RevenueSource};

#[derive(Parser)]
#[command(name = "clinicdw", about = "Clinic revenue and footfall reporting CLI")]
struct Cli {
    /// Database path (default: ~/.clinicdw/clinicdw.db)
    #[arg(long)]
    db: Option<String>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Revenue for a month, with category split and projection
    Revenue {
        /// Month as YYYY-MM or "mtd" (default: current month)
        #[arg(long)]
        month: Option<String>,
        /// Division name
        #[arg(long)]
        division: Option<String>,
        /// Centre ID
        #[arg(long)]
        centre: Option<i64>,
        /// Revenue source: otc, patient, combined
        #[arg(long, default_value = "combined")]
        source: String,
        /// Month target (default: stored target, if any)
        #[arg(long)]
        target: Option<f64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Footfall for a month, by speciality, with projection
    Footfall {
        /// Month as YYYY-MM or "mtd" (default: current month)
        #[arg(long)]
        month: Option<String>,
        /// Division name
        #[arg(long)]
        division: Option<String>,
        /// Centre ID
        #[arg(long)]
        centre: Option<i64>,
        /// Month target (default: stored target, else recommended)
        #[arg(long)]
        target: Option<f64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Per-centre trends against last month and last year
    Centres {
        /// Month as YYYY-MM or "mtd" (default: previous month)
        #[arg(long)]
        month: Option<String>,
        /// Metric: footfall, revenue
        #[arg(long, default_value = "footfall")]
        metric: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List divisions or centres
    Lookup {
        #[command(subcommand)]
        target: LookupTarget,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Manage monthly targets
    Target {
        #[command(subcommand)]
        action: TargetAction,
    },
    /// Load a JSON snapshot of source records
    Import {
        /// Path to the snapshot file
        file: String,
    },
    /// Show warehouse status
    Status,
}

#[derive(Subcommand)]
enum LookupTarget {
    /// List divisions
    Divisions {
        #[arg(long)]
        json: bool,
    },
    /// List centres
    Centres {
        /// Only centres in this division
        #[arg(long)]
        division: Option<String>,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a config value
    Get { key: String },
    /// Set a config value (excluded_weekday, otc_min_amount)
    Set { key: String, value: String },
    /// List all config values
    List,
}

#[derive(Subcommand)]
enum TargetAction {
    /// Set the target for a metric and month
    Set {
        /// Metric: footfall, revenue
        metric: String,
        /// Month as YYYY-MM or "mtd"
        month: String,
        value: f64,
    },
    /// Show the target for a metric and month
    Get { metric: String, month: String },
    /// List stored targets
    List {
        /// Only targets for this metric
        #[arg(long)]
        metric: Option<String>,
    },
}

fn parse_month_or(month: Option<&str>, default: Month) -> anyhow::Result<Month> {
    match month {
        Some(m) => Ok(Month::parse(m)?),
        None => Ok(default),
    }
}

fn build_filter(division: Option<&str>, centre: Option<i64>) -> ReportFilter {
    let mut filter = ReportFilter::new();
    if let Some(d) = division {
        filter = filter.division(d);
    }
    if let Some(c) = centre {
        filter = filter.centre(c);
    }
    filter
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let db = match &cli.db {
        Some(path) => clinicdw::Database::open_at(path).await?,
        None => clinicdw::Database::open().await?,
    };
    let dw = ClinicDW::new(db);

    let today = chrono::Local::now().date_naive();
    let this_month = Month::containing(today);

    match cli.command {
        Commands::Revenue {
            month,
            division,
            centre,
            source,
            target,
            json,
        } => {
            let month = parse_month_or(month.as_deref(), this_month)?;
            let source: RevenueSource = source.parse()?;
            let filter = build_filter(division.as_deref(), centre).source(source);
            let report = dw.revenue_report(month, &filter, target, today).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Revenue: {} ({})", report.label, report.source.as_str());
                print_scope(report.division.as_deref(), report.centre_id);
                println!("  Total: {:.2}", report.total);
                print_shares("Categories", &report.categories);
                print_period_totals(&report.last_3_months, &report.last_3_months_prev_year);
                print_projection(report.projection.as_ref());
            }
        }
        Commands::Footfall {
            month,
            division,
            centre,
            target,
            json,
        } => {
            let month = parse_month_or(month.as_deref(), this_month)?;
            let filter = build_filter(division.as_deref(), centre);
            let report = dw.footfall_report(month, &filter, target, today).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Footfall: {}", report.label);
                print_scope(report.division.as_deref(), report.centre_id);
                println!("  Total:              {}", report.total);
                println!("  Previous month:     {}", report.prev_month_total);
                println!("  Same month LY:      {}", report.prev_year_prev_month_total);
                println!("  Recommended target: {}", report.recommended_target);
                print_shares("Specialities", &report.speciality_shares);
                print_period_totals(&report.last_3_months, &report.last_3_months_prev_year);
                print_projection(report.projection.as_ref());
            }
        }
        Commands::Centres {
            month,
            metric,
            json,
        } => {
            let month = parse_month_or(month.as_deref(), this_month.previous())?;
            let metric: ReportMetric = metric.parse()?;
            let report = dw.centre_report(month, metric).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_centre_report(&report);
            }
        }
        Commands::Lookup { target } => match target {
            LookupTarget::Divisions { json } => {
                let divisions = dw.list_divisions().await?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&divisions)?);
                } else if divisions.is_empty() {
                    println!("No divisions.");
                } else {
                    for d in &divisions {
                        let mut flags = Vec::new();
                        if !d.is_active {
                            flags.push("inactive");
                        }
                        if !d.is_reporting {
                            flags.push("not reporting");
                        }
                        if flags.is_empty() {
                            println!("  {:>4}  {}", d.division_id, d.name);
                        } else {
                            println!("  {:>4}  {} ({})", d.division_id, d.name, flags.join(", "));
                        }
                    }
                }
            }
            LookupTarget::Centres { division, json } => {
                let centres = dw.list_centres(division.as_deref()).await?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&centres)?);
                } else if centres.is_empty() {
                    println!("No centres.");
                } else {
                    for c in &centres {
                        let flag = if c.is_reporting { "" } else { " (not reporting)" };
                        println!(
                            "  {:>4}  {:<20} {}{flag}",
                            c.centre_id, c.village, c.division_name
                        );
                    }
                }
            }
        },
        Commands::Config { action } => match action {
            ConfigAction::Get { key } => match dw.config_get(&key).await? {
                Some(v) => println!("{key} = {v}"),
                None => println!("{key} is not set"),
            },
            ConfigAction::Set { key, value } => {
                dw.config_set(&key, &value).await?;
                println!("Config updated.");
            }
            ConfigAction::List => {
                let items = dw.config_list().await?;
                if items.is_empty() {
                    println!("No config values set.");
                } else {
                    for (k, v) in &items {
                        println!("{k} = {v}");
                    }
                }
            }
        },
        Commands::Target { action } => match action {
            TargetAction::Set {
                metric,
                month,
                value,
            } => {
                let metric: ReportMetric = metric.parse()?;
                let month = Month::parse(&month)?;
                dw.set_target(metric, month, value).await?;
                println!("Target set: {metric} {month} = {value}");
            }
            TargetAction::Get { metric, month } => {
                let metric: ReportMetric = metric.parse()?;
                let month = Month::parse(&month)?;
                match dw.get_target(metric, month).await? {
                    Some(v) => println!("{metric} {month} = {v}"),
                    None => println!("No {metric} target for {month}"),
                }
            }
            TargetAction::List { metric } => {
                let metric = metric.as_deref().map(str::parse::<ReportMetric>).transpose()?;
                let targets = dw.list_targets(metric).await?;
                if targets.is_empty() {
                    println!("No targets set.");
                } else {
                    for t in &targets {
                        println!("  {}  {:<9} {}", t.month_key, t.metric, t.target);
                    }
                }
            }
        },
        Commands::Import { file } => {
            let report = dw.import_file(&file).await?;
            println!("Imported {file}");
            println!("  Divisions: {}", report.divisions);
            println!("  Centres:   {}", report.centres);
            println!("  Doctors:   {}", report.doctors);
            println!("  Patients:  {}", report.patients);
            println!("  Visits:    {}", report.visits);
            println!("  OTC sales: {}", report.otc_sales);
            if report.skipped > 0 {
                println!("  Skipped:   {}", report.skipped);
            }
        }
        Commands::Status => {
            println!("Warehouse Status");
            for (table, count) in dw.status().await? {
                println!("  {table:<16} {count}");
            }
        }
    }

    Ok(())
}

fn print_scope(division: Option<&str>, centre_id: Option<i64>) {
    if let Some(d) = division {
        println!("  Division: {d}");
    }
    if let Some(c) = centre_id {
        println!("  Centre:   {c}");
    }
}

fn print_shares(title: &str, shares: &[CategoryShare]) {
    if shares.is_empty() {
        return;
    }
    println!("  {title}:");
    for s in shares {
        println!("    {:<20} {:>12.2} ({:.1}%)", s.category, s.value, s.percentage);
    }
}

fn print_period_totals(current: &PeriodTotals, prior: &PeriodTotals) {
    println!("  Last 3 months:");
    println!("    {:<16} {:>12.2}", current.label, current.total);
    println!("    {:<16} {:>12.2}", prior.label, prior.total);
}

fn print_projection(projection: Option<&ProjectionResult>) {
    let Some(p) = projection else {
        println!("  Projection: n/a");
        return;
    };
    println!("  Projection:");
    println!("    Target:         {:.2}", p.target);
    println!("    Month to date:  {:.2}", p.month_to_date_total);
    println!("    Projected:      {:.2}", p.projected_month_end);
    println!(
        "    Status:         {}",
        if p.is_on_track { "on track" } else { "off track" }
    );
    if let Some(req) = p.required_per_remaining_day {
        println!(
            "    Needed per day: {req:.2} ({} working days left)",
            p.remaining_working_days
        );
    }
}

fn print_centre_report(report: &clinicdw::CentreReport) {
    println!("Centres: {} ({})", report.label, report.metric);
    println!(
        "  {:<14} {:<18} {:>10} {:>10} {:>10}  {:>10}  {:>10}  Category",
        "Division", "Centre", "Current", "Prev mo", "Prev yr", "vs month", "vs year"
    );
    for s in &report.summaries {
        println!(
            "  {:<14} {:<18} {:>10.0} {:>10.0} {:>10.0}  {:>10}  {:>10}  {}",
            s.division,
            s.centre,
            s.current,
            s.prev_month,
            s.prev_year,
            s.trend_month_display,
            s.trend_year_display,
            s.category
        );
    }
    let t = &report.summary;
    println!(
        "  {:<33} {:>10.0} {:>10.0} {:>10.0}  {:>10}  {:>10}",
        format!("Total ({} centres)", t.entity_count),
        t.total_current,
        t.total_prev_month,
        t.total_prev_year,
        t.trend_month_display,
        t.trend_year_display
    );
}
