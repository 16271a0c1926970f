use std::io::{stdout, Write};

use anyhow::{Context, Result};
use handlebars::handlebars_helper;
use losc::{Assembler, Decoded, Filters, Kind, Locator, Segment};
use serde::Serialize;

use crate::Query;

#[derive(Debug, Clone)]
pub enum Format {
    Json,
    Text,
}

impl clap::ValueEnum for Format {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Json, Self::Text]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        match self {
            Self::Json => Some(clap::builder::PossibleValue::new("json")),
            Self::Text => Some(clap::builder::PossibleValue::new("text")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct BitSummary {
    bit: u32,
    name: String,
    /// Samples with this bit set.
    count: usize,
}

#[derive(Debug, Clone, Serialize)]
struct Summary {
    detector: String,
    kind: String,
    name: String,
    unit: String,
    segment: Segment,
    start_utc: String,
    duration: f64,
    sample_rate: f64,
    samples: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    bits: Vec<BitSummary>,
    /// Bits set in the data that have no name.
    #[serde(skip_serializing_if = "Option::is_none")]
    unnamed_bits: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    values: Option<Vec<Sample>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
struct Sample {
    time: f64,
    value: f64,
}

fn summarize(detector: &str, decoded: &Decoded, with_values: bool) -> Summary {
    let (name, unit, t0, span, rate, len) = match decoded {
        Decoded::Strain(ts) => (&ts.name, &ts.unit, ts.t0, ts.span(), ts.sample_rate(), ts.len()),
        Decoded::State(sv) => (
            &sv.series.name,
            &sv.series.unit,
            sv.series.t0,
            sv.span(),
            sv.series.sample_rate(),
            sv.len(),
        ),
    };
    let (bits, unnamed_bits) = match decoded {
        Decoded::State(sv) => (
            sv.bits
                .iter()
                .map(|(bit, name)| BitSummary {
                    bit,
                    name: name.to_string(),
                    count: sv
                        .series
                        .data
                        .iter()
                        .filter(|v| bit < 32 && *v & (1 << bit) != 0)
                        .count(),
                })
                .collect(),
            Some(sv.unnamed_bits()),
        ),
        Decoded::Strain(_) => (Vec::default(), None),
    };
    let values = with_values.then(|| match decoded {
        Decoded::Strain(ts) => ts
            .times()
            .zip(ts.data.iter().copied())
            .map(|(time, value)| Sample { time, value })
            .collect(),
        Decoded::State(sv) => sv
            .series
            .times()
            .zip(sv.series.data.iter().map(|v| f64::from(*v)))
            .map(|(time, value)| Sample { time, value })
            .collect(),
    });

    Summary {
        detector: detector.to_string(),
        kind: decoded.kind().to_string(),
        name: name.clone(),
        unit: unit.to_string(),
        segment: span,
        start_utc: losc::GpsTime::new(t0).epoch().to_string(),
        duration: span.duration(),
        sample_rate: rate,
        samples: len,
        bits,
        unnamed_bits,
        values,
    }
}

pub fn fetch<L: Locator>(
    assembler: &Assembler<L>,
    query: &Query,
    state: bool,
    with_values: bool,
    format: &Format,
) -> Result<()> {
    let kind = if state { Kind::State } else { Kind::Strain };
    let decoded = assembler
        .assemble(
            &query.detector,
            query.start,
            query.end,
            kind,
            &Filters::from(&query.filters),
        )
        .with_context(|| {
            format!(
                "failed to fetch {kind} data for {} in [{}, {})",
                query.detector, query.start, query.end
            )
        })?;
    let summary = summarize(&query.detector, &decoded, with_values);

    match format {
        Format::Json => {
            serde_json::to_writer_pretty(stdout(), &summary).context("serializing to json")
        }
        Format::Text => {
            let data = render_text(&summary).context("serializing summary")?;
            stdout()
                .write_all(str::as_bytes(&data))
                .context("writing to stdout")
        }
    }
}

handlebars_helper!(left_pad: |num: u64, v: Json| {
    let v = match v {
        serde_json::Value::String(s) => s.to_owned(),
        serde_json::Value::Null => String::new(),
        _ => v.to_string()
    };
    let num = usize::try_from(num).unwrap_or(0).max(v.len());
    format!("{v:>num$}")
});

pub fn renderer() -> Result<handlebars::Handlebars<'static>> {
    let mut hb = handlebars::Handlebars::new();
    hb.register_helper("lpad", Box::new(left_pad));
    hb.register_template_string("summary", TEXT_TEMPLATE)
        .context("registering summary template")?;
    hb.register_template_string("locate", crate::locate::TEXT_TEMPLATE)
        .context("registering locate template")?;
    Ok(hb)
}

fn render_text(summary: &Summary) -> Result<String> {
    renderer()?
        .render("summary", &summary)
        .context("rendering text")
}

const TEXT_TEMPLATE: &str = r"{{ detector }} {{ kind }}: {{ name }}
===============================================================================
Start:       {{ segment.start }} ({{ start_utc }})
End:         {{ segment.end }}
Duration:    {{ duration }} s
Sample rate: {{ sample_rate }} Hz
Samples:     {{ samples }}
Unit:        {{ unit }}
{{ #if bits }}-------------------------------------------------------------------------------
Bit  Name                                                                    Set
-------------------------------------------------------------------------------
{{ #each bits }}{{ lpad 3 bit }}  {{ name }}  {{ lpad 10 count }}
{{ /each }}Unnamed bits: {{ unnamed_bits }}
{{ /if }}{{ #if values }}-------------------------------------------------------------------------------
{{ #each values }}{{ lpad 20 time }}  {{ value }}
{{ /each }}{{ /if }}";
