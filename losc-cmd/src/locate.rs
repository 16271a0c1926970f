use std::io::{stdout, Write};

use anyhow::{Context, Result};
use losc::{url, Assembler, Filters, Locator, Segment};
use serde::Serialize;

use crate::fetch::{renderer, Format};
use crate::Query;

#[derive(Debug, Clone, Serialize)]
struct Located {
    url: String,
    segment: Segment,
    /// Part of the requested interval read from this file.
    keep: Segment,
    format: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct Listing {
    detector: String,
    requested: Segment,
    files: Vec<Located>,
}

fn listing<L: Locator>(assembler: &Assembler<L>, query: &Query) -> Result<Listing> {
    let (requested, urls) = assembler
        .candidates(
            &query.detector,
            query.start,
            query.end,
            &Filters::from(&query.filters),
        )
        .context("locating files")?;
    let files: Vec<Located> = urls
        .into_iter()
        .map(|u| {
            let segment = url::file_segment(&u)?;
            Ok(Located {
                format: losc::Format::from_url(&u).ok().map(|f| f.to_string()),
                keep: segment & requested,
                segment,
                url: u,
            })
        })
        .collect::<losc::Result<_>>()?;
    Ok(Listing {
        detector: query.detector.clone(),
        requested,
        files,
    })
}

pub fn locate<L: Locator>(assembler: &Assembler<L>, query: &Query, format: &Format) -> Result<()> {
    let listing = listing(assembler, query)?;
    match format {
        Format::Json => {
            serde_json::to_writer_pretty(stdout(), &listing).context("serializing to json")
        }
        Format::Text => {
            let data = renderer()?
                .render("locate", &listing)
                .context("rendering text")?;
            stdout()
                .write_all(str::as_bytes(&data))
                .context("writing to stdout")
        }
    }
}

pub const TEXT_TEMPLATE: &str = r"{{ detector }} [{{ requested.start }} .. {{ requested.end }})
===============================================================================
{{ #each files }}{{ lpad 12 segment.start }} {{ lpad 12 segment.end }}  {{ url }}
{{ /each }}";
