use std::io::{Read, Write};
use std::pin::pin;
use std::time::Duration;
use csv::ByteRecord;
use futures::StreamExt;
use log::{debug, warn};
use crate::address::{normalize, split_full_address, AddressComponents};
use crate::record::{find_column, OutputLayout, COMPONENT_NAMES};
use crate::verify::Verify;

/// where the address lives in an input row
#[derive(Debug, Clone)]
pub enum Layout {
    /// five discrete columns: street, secondary, city, state, zip
    Components { columns: [String; 5] },
    /// one free-text column holding the whole address
    FullAddress { column: String },
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub layout: Layout,
    /// prefix of the generated component columns
    pub prefix: String,
    /// delay after every remote call
    pub throttle: Duration,
    /// remote calls in flight at once
    pub concurrency: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub rows: usize,
    /// rows carrying a merged remote result
    pub verified: usize,
    /// rows whose remote call failed and kept the local result
    pub fallbacks: usize,
}

enum Outcome {
    Local,
    Verified,
    Fallback,
}

/// column positions resolved against the input header
enum Extractor {
    Components([Option<usize>; 5]),
    FullAddress(Option<usize>),
}

impl Extractor {
    fn new(layout: &Layout, headers: &[String]) -> Self {
        match layout {
            Layout::Components { columns } => {
                let positions = columns.each_ref().map(|name| {
                    let position = find_column(headers, name);
                    if position.is_none() {
                        warn!("input has no column [{}], treating it as empty", name);
                    }
                    position
                });
                Extractor::Components(positions)
            }
            Layout::FullAddress { column } => {
                let position = find_column(headers, column);
                if position.is_none() {
                    warn!("input has no column [{}], every row will be empty", column);
                }
                Extractor::FullAddress(position)
            }
        }
    }

    fn normalize(&self, fields: &[String]) -> AddressComponents {
        let field = |position: Option<usize>| {
            position
                .and_then(|idx| fields.get(idx))
                .map(String::as_str)
                .unwrap_or_default()
        };

        match self {
            Extractor::Components(positions) => {
                let [street, unit, city, state, zip] = positions.map(field);
                normalize(street, unit, city, state, zip)
            }
            Extractor::FullAddress(position) => split_full_address(field(*position)),
        }
    }
}

fn decode(record: &ByteRecord) -> Vec<String> {
    record
        .iter()
        .map(|field| String::from_utf8_lossy(field).into_owned())
        .collect()
}

/// Normalize every row of `input` and write it, with the generated columns
/// appended, to `output`.
///
/// Each input row yields exactly one output row, in input order. A failed
/// verification keeps the local result.
pub async fn process<R, W, V>(
    input: R,
    output: W,
    options: &PipelineOptions,
    verifier: Option<&V>,
) -> color_eyre::Result<Summary>
where
    R: Read,
    W: Write,
    V: Verify,
{
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(input);
    let headers = decode(reader.byte_headers()?);

    let extractor = &Extractor::new(&options.layout, &headers);
    let layout = OutputLayout::new(&headers, &COMPONENT_NAMES, &options.prefix);
    debug!("output columns: {:?}", layout.generated());

    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(output);
    writer.write_record(layout.headers())?;

    let throttle = options.throttle;
    let rows = futures::stream::iter(reader.byte_records().enumerate())
        .map(|(idx, record)| async move {
            let fields = decode(&record?);
            let local = extractor.normalize(&fields);
            let (components, outcome) = verify_row(idx + 1, local, verifier, throttle).await;
            Ok::<_, csv::Error>((fields, components, outcome))
        })
        .buffered(options.concurrency.max(1));
    let mut rows = pin!(rows);

    let mut summary = Summary::default();
    while let Some(row) = rows.next().await {
        let (fields, components, outcome) = row?;
        writer.write_record(&layout.row(&fields, &components))?;

        summary.rows += 1;
        match outcome {
            Outcome::Verified => summary.verified += 1,
            Outcome::Fallback => summary.fallbacks += 1,
            Outcome::Local => {}
        }
    }

    writer.flush()?;
    Ok(summary)
}

/// `row` is the 1-based data row number, used in log messages only
async fn verify_row<V: Verify>(
    row: usize,
    local: AddressComponents,
    verifier: Option<&V>,
    throttle: Duration,
) -> (AddressComponents, Outcome) {
    let Some(verifier) = verifier else {
        return (local, Outcome::Local);
    };
    if local.is_empty() {
        return (local, Outcome::Local);
    }

    let result = verifier.verify(&local).await;
    if !throttle.is_zero() {
        tokio::time::sleep(throttle).await;
    }

    match result {
        Ok(verified) => (local.overlay(verified), Outcome::Verified),
        Err(e) => {
            warn!("Row {}: {} verification failed: {}", row, verifier.name(), e);
            (local, Outcome::Fallback)
        }
    }
}
