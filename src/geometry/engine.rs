use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use super::{
    AxisGeometry, CurveGeometry, Direction, GeometryError, GeometryModel, GraphGeometry, PlotPoint, Tick,
};
use crate::aggregate::Triple;
use crate::descriptor::{AxisConfig, BenchId, BoundGraph, CurveData, CurveNode, Description, GraphNode};
use crate::style::{ScaleKind, StyleCategory, StyleRegistry};
use crate::value::{AxisKey, Value};

/// Extra slots around each bar group so neighbouring groups stay apart.
const GROUP_PADDING: usize = 4;

pub struct GeometryEngine<'a> {
    description: &'a Description,
    styles: &'a StyleRegistry,
}

/// One bound curve instance with its aggregated buckets.
struct Instance<'a> {
    curve: &'a CurveNode,
    bench: BenchId,
    data: &'a CurveData,
    first: bool,
    direction: Direction,
    buckets: Vec<(Value, Triple)>,
    points: Vec<Placed>,
}

impl Instance<'_> {
    fn emitted(&self) -> bool {
        !self.curve.options.skip
    }
}

/// A point during layout, expressed along the bucket axis and the value
/// (aggregated) axis.
#[derive(Debug, Clone)]
struct Placed {
    raw_x: Value,
    raw_y: Value,
    key: AxisKey,
    bucket: f64,
    value: f64,
    low: f64,
    high: f64,
}

/// Plotted coordinates of one axis: category positions, the bar group
/// width and the offset of each bar member.
struct AxisPlacement<'c> {
    config: &'c AxisConfig,
    categories: Vec<String>,
    group_width: Option<usize>,
    offsets: BTreeMap<usize, f64>,
}

impl AxisPlacement<'_> {
    fn is_category(&self) -> bool {
        self.config.scale.scale() == ScaleKind::Category
    }

    fn slot(&self, index: usize) -> f64 {
        let position = (index + 1) as f64;
        match self.group_width {
            Some(width) => position * width as f64,
            None => position,
        }
    }

    fn place(&self, raw: &Value, instance: usize) -> Option<f64> {
        if self.is_category() {
            let label = raw.to_string();
            let index = self.categories.iter().position(|category| *category == label)?;
            let offset = self.offsets.get(&instance).copied().unwrap_or(0.0);
            return Some(self.slot(index) + offset);
        }
        let number = raw.as_number()?;
        if self.config.scale.scale() == ScaleKind::Log && number <= 0.0 {
            return None;
        }
        Some(number)
    }

    fn ticks(&self) -> Vec<Tick> {
        self.categories
            .iter()
            .enumerate()
            .map(|(index, label)| Tick {
                label: label.clone(),
                position: self.slot(index),
            })
            .collect()
    }

    fn geometry(&self) -> AxisGeometry {
        AxisGeometry {
            scale: self.config.scale.clone(),
            label: self.config.label.clone(),
            ticks: self.ticks(),
            range: self.config.range,
        }
    }
}

impl<'a> GeometryEngine<'a> {
    pub fn new(description: &'a Description, styles: &'a StyleRegistry) -> Self {
        Self { description, styles }
    }

    pub fn layout(&self, bound: &[BoundGraph]) -> Result<GeometryModel, GeometryError> {
        let graphs = bound
            .iter()
            .map(|graph| self.layout_graph(graph))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(GeometryModel {
            title: self.description.title.clone(),
            graphs,
        })
    }

    pub fn layout_graph(&self, bound: &BoundGraph) -> Result<GraphGeometry, GeometryError> {
        let graph = self.description.graph(bound.graph);
        let mut instances = self.aggregate(bound);

        let mut x = AxisPlacement {
            config: &graph.x,
            categories: Vec::new(),
            group_width: None,
            offsets: BTreeMap::new(),
        };
        let mut y = AxisPlacement {
            config: &graph.y,
            categories: Vec::new(),
            group_width: None,
            offsets: BTreeMap::new(),
        };
        if x.is_category() {
            x.categories = categories(&graph.x, &instances, Direction::ByX);
        }
        if y.is_category() {
            y.categories = categories(&graph.y, &instances, Direction::ByY);
        }
        if graph.options.xoffset && x.is_category() {
            group_bars(&mut x, &instances, |curve| curve.options.bar);
        }
        if graph.options.yoffset && y.is_category() {
            group_bars(&mut y, &instances, |curve| curve.options.hbar);
        }

        for (index, instance) in instances.iter_mut().enumerate() {
            instance.points = place_points(instance, index, &x, &y);
        }

        if graph.options.normalize {
            normalize(graph, &mut instances);
        }
        for instance in instances.iter_mut().filter(|instance| instance.curve.options.accum) {
            let bucket_axis = match instance.direction {
                Direction::ByX => &x,
                Direction::ByY => &y,
            };
            if !bucket_axis.is_category() {
                accumulate(&mut instance.points);
            }
        }
        if graph.options.stack {
            stack(&mut instances, &x, &y);
        }

        let mut curves = Vec::new();
        let mut points = Vec::new();
        for instance in instances.into_iter().filter(Instance::emitted) {
            let id = curves.len();
            curves.push(self.curve_geometry(id, &instance)?);
            let direction = instance.direction;
            points.extend(instance.points.into_iter().map(|point| {
                let (plotted_x, plotted_y) = match direction {
                    Direction::ByX => (point.bucket, point.value),
                    Direction::ByY => (point.value, point.bucket),
                };
                PlotPoint {
                    curve_id: id,
                    raw_x: point.raw_x,
                    raw_y: point.raw_y,
                    plotted_x,
                    plotted_y,
                    low: point.low,
                    high: point.high,
                }
            }));
        }

        debug!(
            graph = bound.graph.0,
            curves = curves.len(),
            points = points.len(),
            "computed graph geometry"
        );
        Ok(GraphGeometry {
            graph: bound.graph,
            title: graph.title.clone(),
            x: x.geometry(),
            y: y.geometry(),
            legend: graph.legend,
            grid: graph.options.grid,
            curves,
            points,
        })
    }

    fn aggregate<'b>(&'b self, bound: &'b BoundGraph) -> Vec<Instance<'b>> {
        let graph = self.description.graph(bound.graph);
        let mut instances = Vec::new();

        for bench in &bound.benches {
            for bound_curve in &bench.curves {
                let curve = self.description.curve(bound_curve.curve);
                let aggregation = self.description.aggregation_for(curve.id);
                let direction = if curve.options.hbar { Direction::ByY } else { Direction::ByX };
                let (bucket_axis, value_axis) = match direction {
                    Direction::ByX => (&graph.x, &graph.y),
                    Direction::ByY => (&graph.y, &graph.x),
                };

                for (index, data) in bound_curve.data.iter().enumerate() {
                    let source = match direction {
                        Direction::ByX => &data.by_x,
                        Direction::ByY => &data.by_y,
                    };
                    let buckets = source
                        .iter()
                        .filter(|(key, _)| !skipped(bucket_axis, key.value()))
                        .flat_map(|(key, values)| {
                            aggregation
                                .apply(values)
                                .into_iter()
                                .filter(move |triple| !skipped(value_axis, &triple.value))
                                .map(move |triple| (key.value().clone(), triple))
                        })
                        .collect();
                    instances.push(Instance {
                        curve,
                        bench: bench.bench,
                        data,
                        first: index == 0,
                        direction,
                        buckets,
                        points: Vec::new(),
                    });
                }
            }
        }
        instances
    }

    fn curve_geometry(&self, id: usize, instance: &Instance<'_>) -> Result<CurveGeometry, GeometryError> {
        let curve = instance.curve;
        let resolve = |category: StyleCategory, name: &Option<String>| {
            self.styles
                .resolve(category, name.as_deref(), id)
                .map_err(|message| GeometryError::Style {
                    location: curve.location.clone(),
                    message,
                })
        };
        Ok(CurveGeometry {
            id,
            curve: curve.id,
            label: instance.data.label.clone(),
            mark_text: instance.data.mark_text.clone(),
            line: resolve(StyleCategory::Line, &curve.line)?,
            mark: resolve(StyleCategory::Mark, &curve.mark)?,
            color: resolve(StyleCategory::Color, &curve.color)?,
            direction: instance.direction,
            bar: curve.options.bar || curve.options.hbar,
            errorbars: curve.options.errorbars,
        })
    }
}

fn skipped(axis: &AxisConfig, raw: &Value) -> bool {
    if axis.skip.is_empty() {
        return false;
    }
    let label = raw.to_string();
    axis.skip.iter().any(|skip| *skip == label)
}

/// Explicit categories first, then every other observed value in the order
/// emitted curves first show it. `bucketed_by` names the curve direction for
/// which this axis holds the bucket values.
fn categories(config: &AxisConfig, instances: &[Instance<'_>], bucketed_by: Direction) -> Vec<String> {
    let observed: BTreeSet<AxisKey> = instances
        .iter()
        .filter(|instance| instance.emitted())
        .flat_map(|instance| {
            instance.buckets.iter().map(move |(bucket, triple)| {
                let raw = if instance.direction == bucketed_by { bucket } else { &triple.value };
                AxisKey(raw.clone())
            })
        })
        .collect();

    let mut categories = config.categories.clone();
    for key in observed {
        let label = key.value().to_string();
        if !categories.contains(&label) {
            categories.push(label);
        }
    }
    categories
}

fn group_bars(axis: &mut AxisPlacement<'_>, instances: &[Instance<'_>], member: impl Fn(&CurveNode) -> bool) {
    let members: Vec<usize> = instances
        .iter()
        .enumerate()
        .filter(|(_, instance)| instance.emitted() && member(instance.curve))
        .map(|(index, _)| index)
        .collect();
    if members.is_empty() {
        return;
    }

    let count = members.len();
    let base = count / 2;
    axis.group_width = Some(count + GROUP_PADDING);
    axis.offsets = members
        .into_iter()
        .enumerate()
        .map(|(bar, instance)| (instance, bar as f64 - base as f64))
        .collect();
}

fn place_points(
    instance: &Instance<'_>,
    index: usize,
    x: &AxisPlacement<'_>,
    y: &AxisPlacement<'_>,
) -> Vec<Placed> {
    let (bucket_axis, value_axis) = match instance.direction {
        Direction::ByX => (x, y),
        Direction::ByY => (y, x),
    };

    let mut points = Vec::with_capacity(instance.buckets.len());
    for (bucket, triple) in &instance.buckets {
        let (Some(bucket_position), Some(value)) = (
            bucket_axis.place(bucket, index),
            value_axis.place(&triple.value, index),
        ) else {
            debug!(
                curve = instance.curve.ordinal + 1,
                bucket = %bucket,
                value = %triple.value,
                "dropped point without a plotted position"
            );
            continue;
        };
        let (low, high) = if value_axis.is_category() {
            (value, value)
        } else {
            (
                triple.low.as_number().unwrap_or(value),
                triple.high.as_number().unwrap_or(value),
            )
        };
        let (raw_x, raw_y) = match instance.direction {
            Direction::ByX => (bucket.clone(), triple.value.clone()),
            Direction::ByY => (triple.value.clone(), bucket.clone()),
        };
        points.push(Placed {
            raw_x,
            raw_y,
            key: AxisKey(bucket.clone()),
            bucket: bucket_position,
            value,
            low,
            high,
        });
    }
    points
}

/// Divides every curve of a bench by its base curve's first instance at the
/// same bucket. Points without a usable divisor move to the value axis base.
fn normalize(graph: &GraphNode, instances: &mut [Instance<'_>]) {
    let mut divisors: BTreeMap<BenchId, BTreeMap<AxisKey, f64>> = BTreeMap::new();
    for instance in instances.iter().filter(|instance| instance.curve.options.base && instance.first) {
        if divisors.contains_key(&instance.bench) {
            warn!(
                curve = instance.curve.ordinal + 1,
                "more than one base curve in a bench; using the first"
            );
            continue;
        }
        let mut values = BTreeMap::new();
        for point in &instance.points {
            values.entry(point.key.clone()).or_insert(point.value);
        }
        divisors.insert(instance.bench, values);
    }

    for instance in instances.iter_mut() {
        let Some(values) = divisors.get(&instance.bench) else {
            continue;
        };
        if instance.curve.options.base {
            continue;
        }
        let (value_axis, value_is_category) = match instance.direction {
            Direction::ByX => (&graph.y, graph.y.scale.scale() == ScaleKind::Category),
            Direction::ByY => (&graph.x, graph.x.scale.scale() == ScaleKind::Category),
        };
        if value_is_category {
            continue;
        }
        for point in &mut instance.points {
            match values.get(&point.key).copied().filter(|divisor| *divisor != 0.0) {
                Some(divisor) => {
                    point.value /= divisor;
                    point.low /= divisor;
                    point.high /= divisor;
                }
                None => {
                    point.value = value_axis.base;
                    point.low = value_axis.base;
                    point.high = value_axis.base;
                }
            }
        }
    }
}

/// Running sum of the value axis along the curve's own bucket order.
fn accumulate(points: &mut [Placed]) {
    let mut total = 0.0;
    for point in points {
        shift(point, total);
        total = point.value;
    }
}

/// Adds each curve's values onto the running total of the curves before it
/// in the same bench, keyed by plotted bucket position.
fn stack(instances: &mut [Instance<'_>], x: &AxisPlacement<'_>, y: &AxisPlacement<'_>) {
    let mut totals: BTreeMap<(BenchId, AxisKey), f64> = BTreeMap::new();
    for instance in instances.iter_mut() {
        if !instance.emitted() || instance.curve.options.no_stack {
            continue;
        }
        let value_axis = match instance.direction {
            Direction::ByX => y,
            Direction::ByY => x,
        };
        if value_axis.is_category() {
            continue;
        }
        for point in &mut instance.points {
            let total = totals
                .entry((instance.bench, AxisKey(Value::Number(point.bucket))))
                .or_insert(0.0);
            shift(point, *total);
            *total = point.value;
        }
    }
}

fn shift(point: &mut Placed, amount: f64) {
    point.value += amount;
    point.low += amount;
    point.high += amount;
}
