use std::fs::File;
use std::io::{self, BufWriter, Write};

use anyhow::{Context, Result};
use tracing::info;

use super::open_store;
use crate::cli::PlotArgs;
use crate::description;
use crate::descriptor::{Binder, build_description};
use crate::expr::EvaluationContext;
use crate::geometry::GeometryEngine;
use crate::render::{
    RawDataConfig, RawDataRenderer, Renderer, ScriptConfig, ScriptRenderer, XmlPlotConfig,
    XmlPlotRenderer,
};
use crate::util::parse_pairs;

/// Output flavour selected by the subcommand name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Graph,
    Data,
    XmlPlot,
}

pub fn run(args: PlotArgs, kind: OutputKind) -> Result<()> {
    let defines = parse_pairs(&args.defines, "define")?;
    let mut ctx = EvaluationContext::from_process(defines);

    let document = description::parse_file(&args.description, &ctx)
        .with_context(|| format!("failed to read description {}", args.description.display()))?;
    let described = build_description(&document, &mut ctx)?;

    let store = open_store(&args.store)?;
    let bound = Binder::new(&store, &ctx).bind(&described)?;
    let model = GeometryEngine::new(&described, ctx.styles()).layout(&bound)?;

    let renderer = renderer_for(&args, kind);
    info!(
        description = %args.description.display(),
        graphs = model.graphs.len(),
        output = renderer.name(),
        "rendering description"
    );

    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            let mut out = BufWriter::new(file);
            renderer.render(&model, &mut out)?;
            out.flush()
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "wrote output");
        }
        None => {
            let mut out = BufWriter::new(io::stdout().lock());
            renderer.render(&model, &mut out)?;
            out.flush()?;
        }
    }

    Ok(())
}

fn renderer_for(args: &PlotArgs, kind: OutputKind) -> Box<dyn Renderer> {
    match kind {
        OutputKind::Graph => Box::new(ScriptRenderer::new(ScriptConfig {
            terminal: args.terminal.clone(),
            output: args.plot_output.clone(),
        })),
        OutputKind::Data => Box::new(RawDataRenderer::new(RawDataConfig {
            separator: args.separator.clone(),
            bounds: args.bounds,
        })),
        OutputKind::XmlPlot => Box::new(XmlPlotRenderer::new(XmlPlotConfig {
            pretty: !args.compact,
            ..XmlPlotConfig::default()
        })),
    }
}
