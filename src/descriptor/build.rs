use tracing::debug;

use super::{
    AxisConfig, BenchId, BenchNode, BindError, CurveId, CurveNode, CurveOptions, Description, Filter,
    GraphId, GraphNode, GraphOptions, LegendPlacement,
};
use crate::aggregate::Aggregation;
use crate::description::{
    Document, Item, Section, SectionKind, parse_assignment, parse_comma_list, parse_flags,
    parse_function_definition, parse_iterate_fields, parse_range, parse_style_definition,
};
use crate::expr::{EvaluationContext, Formula, substitute_text};
use crate::style::{StyleCategory, UserStyle};

/// Builds the descriptor arena from parsed sections. Global sections are
/// applied to `ctx` first (environment defaults, calculated variables,
/// functions and user kinds), then graphs, benches and curves are attached
/// in document order.
pub fn build_description(document: &Document, ctx: &mut EvaluationContext) -> Result<Description, BindError> {
    let mut description = Description::default();
    let mut default_aggregation = None;

    for section in document.sections.iter().filter(|section| section.kind == SectionKind::Global) {
        apply_global(section, ctx, &mut description, &mut default_aggregation)?;
    }

    let mut ordinal = 0;
    for section in &document.sections {
        match section.kind {
            SectionKind::Global => {}
            SectionKind::Graph => {
                let id = GraphId(description.graphs.len());
                let graph = build_graph(id, section, ctx, default_aggregation)?;
                description.graphs.push(graph);
                ordinal = 0;
            }
            SectionKind::Bench => {
                let graph = description
                    .graphs
                    .last_mut()
                    .ok_or_else(|| BindError::invalid(&section.location, "[bench] section before any [graph]"))?;
                let id = BenchId(description.benches.len());
                graph.benches.push(id);
                let bench = build_bench(id, graph.id, section, ctx)?;
                description.benches.push(bench);
            }
            SectionKind::Curve => {
                let current_graph = description.graphs.last().map(|graph| graph.id);
                let bench = description
                    .benches
                    .last_mut()
                    .filter(|bench| Some(bench.graph) == current_graph)
                    .ok_or_else(|| BindError::invalid(&section.location, "[curve] section before any [bench]"))?;
                let id = CurveId(description.curves.len());
                bench.curves.push(id);
                let curve = build_curve(id, bench.id, ordinal, section, ctx)?;
                description.curves.push(curve);
                ordinal += 1;
            }
        }
    }

    debug!(
        graphs = description.graphs.len(),
        benches = description.benches.len(),
        curves = description.curves.len(),
        "built descriptor tree"
    );
    Ok(description)
}

fn apply_global(
    section: &Section,
    ctx: &mut EvaluationContext,
    description: &mut Description,
    default_aggregation: &mut Option<Aggregation>,
) -> Result<(), BindError> {
    for item in &section.items {
        let location = &item.location;
        match item.key.as_str() {
            "env" => {
                let (name, value) = parse_assignment(&item.value)
                    .ok_or_else(|| BindError::invalid(location, "expected NAME = value"))?;
                ctx.set_default_env(&name, &value);
            }
            "calc" => {
                let (name, source) = parse_assignment(&item.value)
                    .ok_or_else(|| BindError::invalid(location, "expected NAME = expression"))?;
                ctx.define_calculated(&name, &source)
                    .map_err(|err| BindError::expr(location, err))?;
            }
            "func" => {
                let (name, params, body) = parse_function_definition(&item.value)
                    .ok_or_else(|| BindError::invalid(location, "expected name(params) = expression"))?;
                ctx.define_function(&name, params, &body)
                    .map_err(|err| BindError::expr(location, err))?;
            }
            "line" | "mark" | "color" | "scale" => {
                let category = StyleCategory::parse(&item.key)
                    .ok_or_else(|| BindError::invalid(location, format!("unknown kind category '{}'", item.key)))?;
                let (name, display, payload) = parse_style_definition(&item.value)
                    .ok_or_else(|| BindError::invalid(location, "expected name = display [payload]"))?;
                ctx.styles_mut()
                    .register(UserStyle {
                        category,
                        name,
                        display,
                        payload,
                    })
                    .map_err(|message| BindError::invalid(location, message))?;
            }
            "title" => description.title = Some(text(item, ctx)?),
            "aggr" => *default_aggregation = Some(aggregation(item)?),
            _ => {}
        }
    }
    Ok(())
}

fn build_graph(
    id: GraphId,
    section: &Section,
    ctx: &EvaluationContext,
    default_aggregation: Option<Aggregation>,
) -> Result<GraphNode, BindError> {
    let xtype = required(section, "xtype")?;
    let ytype = required(section, "ytype")?;

    let mut options = GraphOptions::default();
    for flag in section.value("options").map(parse_flags).unwrap_or_default() {
        match flag.as_str() {
            "stack" => options.stack = true,
            "normalize" => options.normalize = true,
            "xoffset" => options.xoffset = true,
            "yoffset" => options.yoffset = true,
            "grid" => options.grid = true,
            other => return Err(BindError::invalid(&section.location, format!("unknown graph option '{other}'"))),
        }
    }

    let legend = match section.value("legend").map(str::to_ascii_lowercase).as_deref() {
        None | Some("inside") => LegendPlacement::Inside,
        Some("none") => LegendPlacement::None,
        Some("outside") => LegendPlacement::Outside,
        Some("below") => LegendPlacement::Below,
        Some(other) => return Err(BindError::invalid(&section.location, format!("unknown legend placement '{other}'"))),
    };

    Ok(GraphNode {
        id,
        location: section.location.clone(),
        title: optional_text(section, "title", ctx)?.unwrap_or_default(),
        x: axis(section, xtype, "x", ctx)?,
        y: axis(section, ytype, "y", ctx)?,
        aggregation: match section.item("aggr") {
            Some(item) => Some(aggregation(item)?),
            None => default_aggregation,
        },
        legend,
        options,
        benches: Vec::new(),
    })
}

fn axis(section: &Section, scale: &Item, prefix: &str, ctx: &EvaluationContext) -> Result<AxisConfig, BindError> {
    let key = |suffix: &str| format!("{prefix}{suffix}");
    let scale_kind = ctx
        .styles()
        .resolve(StyleCategory::Scale, Some(&scale.value), 0)
        .map_err(|message| BindError::invalid(&scale.location, message))?;

    let base = match section.item(&key("base")) {
        Some(item) => item
            .value
            .trim()
            .parse::<f64>()
            .map_err(|_| BindError::invalid(&item.location, format!("'{}' is not a number", item.value)))?,
        None => 0.0,
    };
    let range = match section.item(&key("range")) {
        Some(item) => parse_range(&item.value).map_err(|message| BindError::invalid(&item.location, message))?,
        None => (None, None),
    };

    Ok(AxisConfig {
        label: optional_text(section, &key("label"), ctx)?,
        scale: scale_kind,
        categories: section.value(&key("categories")).map(parse_comma_list).unwrap_or_default(),
        skip: section.value(&key("skip")).map(parse_comma_list).unwrap_or_default(),
        base,
        range,
    })
}

fn build_bench(id: BenchId, graph: GraphId, section: &Section, ctx: &EvaluationContext) -> Result<BenchNode, BindError> {
    let name = text(required(section, "name")?, ctx)?;
    let include_outliers = section
        .value("outliers")
        .is_some_and(|mode| mode.eq_ignore_ascii_case("include"));

    Ok(BenchNode {
        id,
        graph,
        location: section.location.clone(),
        name,
        filters: filters(section),
        selects: section.values("select").map(|item| item.value.clone()).collect(),
        include_outliers,
        label: optional_text(section, "label", ctx)?,
        curves: Vec::new(),
    })
}

fn build_curve(
    id: CurveId,
    bench: BenchId,
    ordinal: usize,
    section: &Section,
    ctx: &EvaluationContext,
) -> Result<CurveNode, BindError> {
    let xval = formula(required(section, "xval")?)?;
    let yval = formula(required(section, "yval")?)?;

    let mut options = CurveOptions::default();
    for flag in section.value("options").map(parse_flags).unwrap_or_default() {
        match flag.as_str() {
            "bar" => options.bar = true,
            "hbar" => options.hbar = true,
            "no_stack" => options.no_stack = true,
            "base" => options.base = true,
            "accum" => options.accum = true,
            "skip" => options.skip = true,
            "errorbars" => options.errorbars = true,
            other => return Err(BindError::invalid(&section.location, format!("unknown curve option '{other}'"))),
        }
    }

    Ok(CurveNode {
        id,
        bench,
        location: section.location.clone(),
        ordinal,
        xval,
        yval,
        label: section.item("label").map(formula).transpose()?,
        mark_text: section.item("marktext").map(formula).transpose()?,
        aggregation: section.item("aggr").map(aggregation).transpose()?,
        line: style_choice(section, StyleCategory::Line, ctx)?,
        mark: style_choice(section, StyleCategory::Mark, ctx)?,
        color: style_choice(section, StyleCategory::Color, ctx)?,
        iterate: section.value("iterate").map(parse_iterate_fields).unwrap_or_default(),
        filters: filters(section),
        options,
    })
}

fn required<'a>(section: &'a Section, key: &'static str) -> Result<&'a Item, BindError> {
    section.item(key).ok_or_else(|| BindError::MissingKey {
        location: section.location.clone(),
        section: section.kind.as_str(),
        key,
    })
}

fn text(item: &Item, ctx: &EvaluationContext) -> Result<String, BindError> {
    substitute_text(&item.value, ctx).map_err(|err| BindError::expr(&item.location, err))
}

fn optional_text(section: &Section, key: &str, ctx: &EvaluationContext) -> Result<Option<String>, BindError> {
    section.item(key).map(|item| text(item, ctx)).transpose()
}

fn formula(item: &Item) -> Result<Formula, BindError> {
    Formula::parse(&item.value).map_err(|err| BindError::expr(&item.location, err))
}

fn aggregation(item: &Item) -> Result<Aggregation, BindError> {
    item.value
        .parse::<Aggregation>()
        .map_err(|message| BindError::invalid(&item.location, message))
}

fn filters(section: &Section) -> Vec<Filter> {
    section
        .values("filter")
        .map(|item| Filter {
            text: item.value.clone(),
            location: item.location.clone(),
        })
        .collect()
}

fn style_choice(
    section: &Section,
    category: StyleCategory,
    ctx: &EvaluationContext,
) -> Result<Option<String>, BindError> {
    let Some(item) = section.item(category.as_str()) else {
        return Ok(None);
    };
    if !ctx.styles().is_known(category, &item.value) {
        return Err(BindError::invalid(
            &item.location,
            format!("unknown {} kind '{}'", category.as_str(), item.value),
        ));
    }
    Ok(Some(item.value.clone()))
}
