use std::io::{self, Write};

use serde::Serialize;

use crate::app::{CatalogResult, ListResult, StageResult};
use crate::tools::ToolReport;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Plain,
    Json,
}

/// One line per URL, path or dataset, for use in shell pipelines.
pub struct PlainOutput;

impl PlainOutput {
    pub fn print_list(result: &ListResult) -> io::Result<()> {
        Self::print_lines(result.urls.iter())
    }

    pub fn print_stage(result: &StageResult) -> io::Result<()> {
        Self::print_lines(result.paths.iter())
    }

    pub fn print_catalog(result: &CatalogResult) -> io::Result<()> {
        let lines = result.datasets.iter().map(|listing| {
            let tiers = listing
                .tiers
                .iter()
                .map(|tier| tier.as_str())
                .collect::<Vec<_>>()
                .join(",");
            format!("{}\t{tiers}", listing.name)
        });
        Self::print_lines(lines)
    }

    pub fn print_tools(report: &ToolReport) -> io::Result<()> {
        let lines = report.tools.iter().map(|tool| {
            format!(
                "{}\t{}\t{}",
                tool.name,
                tool.path.as_deref().unwrap_or("missing"),
                tool.version.as_deref().unwrap_or("-")
            )
        });
        Self::print_lines(lines)
    }

    fn print_lines<I, T>(lines: I) -> io::Result<()>
    where
        I: Iterator<Item = T>,
        T: AsRef<str>,
    {
        let mut stdout = io::stdout().lock();
        for line in lines {
            stdout.write_all(line.as_ref().as_bytes())?;
            stdout.write_all(b"\n")?;
        }
        stdout.flush()
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_list(result: &ListResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_stage(result: &StageResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_catalog(result: &CatalogResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_tools(report: &ToolReport) -> io::Result<()> {
        Self::print_json(report)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
