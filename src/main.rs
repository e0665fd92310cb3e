use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use stance_analytics::aggregate::{
    aggregate, aggregate_first_appearance, stance_counts, week_range_label, weekly_stance,
    DateRange, Granularity,
};
use stance_analytics::assets::DatasetFamily;
use stance_analytics::bootstrap::{BootstrapTable, Metric};
use stance_analytics::config::Config;
use stance_analytics::fetch::{AnyFetcher, HttpFetcher};
use stance_analytics::loader::DatasetLoader;
use stance_analytics::logging::{log, obj, v_str, Domain, Level};
use stance_analytics::overview::{evaluations_overview, operation_overview, opinion_summary};
use stance_analytics::preferences::{SidebarPrefs, SqliteStore};
use stance_analytics::significance::{error_bars, weekly_flags};
use stance_analytics::timeout::load_settled;
use stance_analytics::LoadResult;

const USAGE: &str = "usage:
  stance datasets <events|opinion>
  stance latest
  stance events <id> [day|week|month|year] [start YYYY-MM-DD] [end YYYY-MM-DD]
  stance opinion <id> [precision|recall|f1] [start] [end]
  stance operation <dataset-id> <operation-id>
  stance evaluations <dataset-id>
  stance prefs [show|collapse|menu <id>|clear]";

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_date(raw: Option<&String>) -> Result<Option<NaiveDate>> {
    raw.filter(|s| !s.is_empty() && s.as_str() != "-")
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("bad date {}", s)))
        .transpose()
}

async fn load_soft<F, T>(label: &str, cfg: &Config, fut: F) -> LoadResult<T>
where
    F: std::future::Future<Output = LoadResult<T>> + Send + 'static,
    T: Send + 'static,
{
    load_settled(label, fut, cfg.load_timeout()).await
}

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    };

    log(
        Level::Info,
        Domain::System,
        "startup",
        obj(&[("command", v_str(command)), ("base_url", v_str(&cfg.base_url))]),
    );

    if command == "prefs" {
        return run_prefs(&cfg, &args[1..]);
    }

    let fetcher = Arc::new(AnyFetcher::new(HttpFetcher::new(cfg.http_timeout())));
    let loader = DatasetLoader::new(fetcher, cfg.asset_base()?);

    match command.as_str() {
        "datasets" => {
            let family = args
                .get(1)
                .and_then(|f| DatasetFamily::parse(f))
                .ok_or_else(|| anyhow!("expected events or opinion\n{}", USAGE))?;
            print_json(&loader.list_datasets(family).await)?;
        }
        "latest" => {
            let (events, opinion) = tokio::join!(
                loader.list_datasets(DatasetFamily::Events),
                loader.list_datasets(DatasetFamily::Opinion),
            );
            let entry = |idx: &stance_analytics::catalog::DatasetIndex| {
                idx.latest().map(|(id, d)| {
                    json!({"id": id, "label": d.label, "description": d.description.clone().unwrap_or_default()})
                })
            };
            print_json(&json!({"events": entry(&events), "opinion": entry(&opinion)}))?;
        }
        "events" => {
            let id = args.get(1).ok_or_else(|| anyhow!(USAGE))?.clone();
            let granularity = match args.get(2) {
                Some(g) => Granularity::parse(g).ok_or_else(|| anyhow!("unknown granularity {}", g))?,
                None => Granularity::Week,
            };
            let range = DateRange::from_dates(parse_date(args.get(3))?, parse_date(args.get(4))?);
            let l = loader.clone();
            let key = id.clone();
            let data = load_soft("events", &cfg, async move { l.load_events(&key).await }).await?;
            print_json(&json!({
                "meta": data.meta,
                "series": data.series,
                "volume": aggregate(&data.records, granularity, &range),
                "events": aggregate_first_appearance(&data.records, granularity, &range),
            }))?;
        }
        "opinion" => {
            let id = args.get(1).ok_or_else(|| anyhow!(USAGE))?.clone();
            let metric = match args.get(2) {
                Some(m) => Metric::parse(m).ok_or_else(|| anyhow!("unknown metric {}", m))?,
                None => Metric::Precision,
            };
            let range = DateRange::from_dates(parse_date(args.get(3))?, parse_date(args.get(4))?);
            let l = loader.clone();
            let key = id.clone();
            let data = load_soft("opinion", &cfg, async move { l.load_opinion(&key).await }).await?;
            print_json(&opinion_report(&data.comments, &data.bootstrap, metric, &range))?;
        }
        "operation" => {
            let (Some(id), Some(op)) = (args.get(1), args.get(2)) else {
                bail!(USAGE);
            };
            let l = loader.clone();
            let key = id.clone();
            let data = load_soft("operation", &cfg, async move { l.load_events(&key).await }).await?;
            print_json(&operation_overview(&data.records, op))?;
        }
        "evaluations" => {
            let id = args.get(1).ok_or_else(|| anyhow!(USAGE))?.clone();
            let l = loader.clone();
            let (data, metrics) = tokio::join!(
                load_soft("evaluations", &cfg, async move { l.load_events(&id).await }),
                loader.load_metrics(),
            );
            print_json(&evaluations_overview(&data?.records, &metrics))?;
        }
        other => bail!("unknown command {}\n{}", other, USAGE),
    }
    Ok(())
}

fn opinion_report(
    comments: &[stance_analytics::record::Record],
    table: &BootstrapTable,
    metric: Metric,
    range: &DateRange,
) -> serde_json::Value {
    let weekly = weekly_stance(comments, range);
    let flags = weekly_flags(&weekly, table, metric);
    let ranges: Vec<String> = weekly
        .weeks
        .iter()
        .filter_map(|w| NaiveDate::parse_from_str(w, "%Y-%m-%d").ok())
        .map(week_range_label)
        .collect();
    json!({
        "summary": opinion_summary(comments, table),
        "bootstrap": table.grouped(),
        "weekly": weekly,
        "week_ranges": ranges,
        "significant": flags,
        "error_bars": error_bars(&stance_counts(comments), table, metric),
        "metric": metric,
    })
}

fn run_prefs(cfg: &Config, args: &[String]) -> Result<()> {
    let mut store = SqliteStore::new(&cfg.prefs_path)?;
    let mut prefs = SidebarPrefs::load(&store);
    match args.first().map(String::as_str) {
        None | Some("show") => {}
        Some("collapse") => {
            prefs.toggle_collapsed();
            prefs.save(&mut store)?;
        }
        Some("menu") => {
            let id = args.get(1).ok_or_else(|| anyhow!("menu needs an id"))?;
            prefs.toggle_menu(id);
            prefs.save(&mut store)?;
        }
        Some("clear") => {
            SidebarPrefs::clear(&mut store)?;
            prefs = SidebarPrefs::default();
        }
        Some(other) => bail!("unknown prefs action {}", other),
    }
    print_json(&prefs)
}
