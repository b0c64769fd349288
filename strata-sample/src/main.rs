use serde::Serialize;
use std::error::Error;
use strata::{Payload, Pipeline, Schema, Stage, StageContext, StageError, StageFuture};
use strata_stages::FilterStage;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Serialize)]
struct City {
    #[serde(rename = "nama")]
    name: String,
    population: u64,
}

// Parses raw JSON and re-emits the rows one record at a time
struct ExplodeRows;

impl Stage for ExplodeRows {
    fn process<'a>(&'a self, input: Payload, ctx: &'a StageContext) -> StageFuture<'a> {
        Box::pin(async move {
            let raw = input
                .as_raw()
                .ok_or_else(|| StageError::fatal("expected raw JSON"))?;
            let table = Payload::from_json(raw)?;
            for record in table.to_records()? {
                ctx.emit(Payload::from_struct(&record)?).await?;
            }
            Ok::<(), StageError>(())
        })
    }

    fn describe(&self) -> String {
        "ExplodeRows".to_string()
    }

    fn concurrency(&self) -> usize {
        2
    }
}

// Renders row payloads back to raw JSON records
struct ToJson;

impl Stage for ToJson {
    fn process<'a>(&'a self, input: Payload, ctx: &'a StageContext) -> StageFuture<'a> {
        Box::pin(async move {
            let records = input.to_records()?;
            let bytes = serde_json::to_vec(&records)
                .map_err(|e| StageError::fatal(format!("encoding records: {e}")))?;
            ctx.emit(Payload::from_raw(bytes)).await
        })
    }

    fn describe(&self) -> String {
        "ToJson".to_string()
    }
}

fn big_city(payload: &Payload) -> bool {
    payload
        .as_table()
        .and_then(|t| t.column("population").and_then(|mut c| c.next().cloned()))
        .and_then(|v| v.as_u64())
        .is_some_and(|p| p > 1_000_000)
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("strata=info".parse()?),
        )
        .init();

    let schema: Schema<City> = Schema::builder()
        .aliased("name", "nama", |c: &City| c.name.clone())
        .field("population", |c: &City| c.population)
        .build()?;
    let cities = [
        City {
            name: "Depok".to_string(),
            population: 2_000_000,
        },
        City {
            name: "Bogor".to_string(),
            population: 1_100_000,
        },
    ];
    info!(columns = ?schema.columns(), "typed schema");
    let seeded = schema.to_payload_slice(&cities);
    let from_serde = Payload::from_struct_slice(&cities)?;
    if seeded != from_serde {
        return Err("schema and serde normalization disagree".into());
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let graph = Pipeline::new()
            .stage(ExplodeRows)
            .stage(FilterStage::new(big_city))
            .stage(ToJson)
            .build()?;
        info!(stages = ?graph.stage_names(), "pipeline assembled");

        let (input_tx, input_rx) = flume::bounded(4);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        input_tx.send(Payload::from_raw(
            r#"[{"nama": "Jakarta", "population": 10560000},
                {"nama": "Cimahi", "population": 570000}]"#,
        ))?;
        input_tx.send(Payload::from_raw(seeded_json(&from_serde)?))?;
        drop(input_tx);

        let report = graph.run_stream(input_rx, shutdown_rx).await?;
        for output in &report.outputs {
            println!("{}", String::from_utf8_lossy(output.as_raw().unwrap_or_default()));
        }
        for stat in &report.stats {
            println!(
                "{}: {} calls, avg {:?}",
                stat.stage,
                stat.executions,
                stat.average().unwrap_or_default()
            );
        }
        Ok(())
    })
}

fn seeded_json(payload: &Payload) -> Result<Vec<u8>, Box<dyn Error>> {
    Ok(serde_json::to_vec(&payload.to_records()?)?)
}
