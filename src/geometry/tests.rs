use std::path::Path;

use super::*;
use crate::description::parse_str;
use crate::descriptor::{BoundBench, BoundCurve, BoundGraph, CurveData, Description, build_description};
use crate::expr::EvaluationContext;
use crate::store::Benchmark;
use crate::value::AxisKey;

fn data(points: &[(Value, Value)]) -> CurveData {
    let mut data = CurveData {
        label: "instance".to_string(),
        ..CurveData::default()
    };
    for (x, y) in points {
        data.by_x.entry(AxisKey(x.clone())).or_default().push(y.clone());
        data.by_y.entry(AxisKey(y.clone())).or_default().push(x.clone());
    }
    data
}

fn numeric(points: &[(f64, f64)]) -> CurveData {
    let points: Vec<(Value, Value)> = points
        .iter()
        .map(|(x, y)| (Value::Number(*x), Value::Number(*y)))
        .collect();
    data(&points)
}

/// Lays out a description whose curves receive `datasets` in declaration
/// order.
fn layout(text: &str, mut datasets: Vec<Vec<CurveData>>) -> GeometryModel {
    let mut ctx = EvaluationContext::default();
    let document = parse_str(text, Path::new("geometry.desc"), &ctx).expect("description parses");
    let description = build_description(&document, &mut ctx).expect("description builds");
    assert_eq!(datasets.len(), description.curves.len(), "one dataset per curve");

    let bound = bind_fixture(&description, &mut datasets);
    GeometryEngine::new(&description, ctx.styles())
        .layout(&bound)
        .expect("layout succeeds")
}

fn bind_fixture(description: &Description, datasets: &mut [Vec<CurveData>]) -> Vec<BoundGraph> {
    description
        .graphs
        .iter()
        .map(|graph| BoundGraph {
            graph: graph.id,
            benches: graph
                .benches
                .iter()
                .map(|bench| BoundBench {
                    bench: *bench,
                    benchmark: Benchmark {
                        id: 1,
                        name: "IOR".to_string(),
                        description: None,
                    },
                    curves: description
                        .bench(*bench)
                        .curves
                        .iter()
                        .map(|curve| BoundCurve {
                            curve: *curve,
                            data: std::mem::take(&mut datasets[curve.0]),
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect()
}

fn plotted(graph: &GraphGeometry, curve_id: usize) -> Vec<(f64, f64)> {
    graph
        .points_of(curve_id)
        .map(|point| (point.plotted_x, point.plotted_y))
        .collect()
}

const HEADER: &str = "[graph]\nxtype: linear\nytype: linear\n";

#[test]
fn category_axis_lists_explicit_labels_first() {
    let model = layout(
        "[graph]\nxtype: category\nytype: linear\nxcategories: large\n\
         [bench]\nname: ior\n[curve]\nxval: $SIZE\nyval: $BW\n",
        vec![vec![data(&[
            (Value::text("small"), Value::Number(10.0)),
            (Value::text("large"), Value::Number(20.0)),
            (Value::text("medium"), Value::Number(5.0)),
        ])]],
    );

    let graph = &model.graphs[0];
    let labels: Vec<&str> = graph.x.ticks.iter().map(|tick| tick.label.as_str()).collect();
    assert_eq!(labels, vec!["large", "medium", "small"]);
    assert_eq!(graph.x.ticks[2].position, 3.0);

    let small = graph
        .points
        .iter()
        .find(|point| point.raw_x == Value::text("small"))
        .expect("small is plotted");
    assert_eq!((small.plotted_x, small.plotted_y), (3.0, 10.0));
}

#[test]
fn observed_categories_are_sorted_across_curves() {
    let model = layout(
        "[graph]\nxtype: category\nytype: linear\n[bench]\nname: ior\n\
         [curve]\nxval: $OP\nyval: $BW\n[curve]\nxval: $OP\nyval: $BW\n",
        vec![
            vec![data(&[(Value::text("write"), Value::Number(2.0))])],
            vec![data(&[(Value::text("read"), Value::Number(1.0))])],
        ],
    );

    let graph = &model.graphs[0];
    let labels: Vec<&str> = graph.x.ticks.iter().map(|tick| tick.label.as_str()).collect();
    assert_eq!(labels, vec!["read", "write"]);
    assert_eq!(plotted(graph, 0), vec![(2.0, 2.0)]);
    assert_eq!(plotted(graph, 1), vec![(1.0, 1.0)]);
}

#[test]
fn bar_groups_spread_members_around_the_slot() {
    let bar = "[curve]\nxval: $OP\nyval: $BW\noptions: bar\n";
    let text = format!(
        "[graph]\nxtype: category\nytype: linear\noptions: xoffset\n[bench]\nname: ior\n{bar}{bar}{bar}\
         [curve]\nxval: $OP\nyval: $BW\n"
    );
    let point = || vec![data(&[(Value::text("read"), Value::Number(1.0))])];
    let model = layout(&text, vec![point(), point(), point(), point()]);

    let graph = &model.graphs[0];
    let xs: Vec<f64> = graph.points.iter().map(|point| point.plotted_x).collect();
    assert_eq!(xs, vec![6.0, 7.0, 8.0, 7.0]);
    assert_eq!(graph.x.ticks[0].position, 7.0);
}

#[test]
fn stacking_accumulates_across_curves_of_a_bench() {
    let text = format!(
        "{}options: stack\n[bench]\nname: ior\n\
         [curve]\nxval: $N\nyval: $BW\n\
         [curve]\nxval: $N\nyval: $BW\n\
         [curve]\nxval: $N\nyval: $BW\noptions: no_stack\n",
        HEADER
    );
    let model = layout(
        &text,
        vec![
            vec![numeric(&[(1.0, 10.0), (2.0, 20.0)])],
            vec![numeric(&[(1.0, 5.0)])],
            vec![numeric(&[(1.0, 1.0)])],
        ],
    );

    let graph = &model.graphs[0];
    assert_eq!(plotted(graph, 1), vec![(1.0, 15.0)]);
    assert_eq!(plotted(graph, 2), vec![(1.0, 1.0)]);
    let stacked = graph.points_of(1).next().expect("stacked point");
    assert_eq!(stacked.raw_y, Value::Number(5.0));
}

#[test]
fn normalization_divides_by_the_base_curve() {
    let text = "[graph]\nxtype: linear\nytype: linear\nybase: 0.5\noptions: normalize\n\
                [bench]\nname: ior\n\
                [curve]\nxval: $N\nyval: $BW\noptions: base\n\
                [curve]\nxval: $N\nyval: $BW\n";
    let model = layout(
        text,
        vec![
            vec![numeric(&[(1.0, 10.0), (2.0, 20.0)])],
            vec![numeric(&[(1.0, 30.0), (2.0, 40.0), (3.0, 50.0)])],
        ],
    );

    let graph = &model.graphs[0];
    assert_eq!(plotted(graph, 0), vec![(1.0, 10.0), (2.0, 20.0)]);
    assert_eq!(plotted(graph, 1), vec![(1.0, 3.0), (2.0, 2.0), (3.0, 0.5)]);
}

#[test]
fn skipped_base_curve_is_not_emitted() {
    let text = "[graph]\nxtype: linear\nytype: linear\noptions: normalize\n\
                [bench]\nname: ior\n\
                [curve]\nxval: $N\nyval: $BW\noptions: base, skip\n\
                [curve]\nxval: $N\nyval: $BW\n";
    let model = layout(
        text,
        vec![vec![numeric(&[(1.0, 4.0)])], vec![numeric(&[(1.0, 2.0)])]],
    );

    let graph = &model.graphs[0];
    assert_eq!(graph.curves.len(), 1);
    assert_eq!(plotted(graph, 0), vec![(1.0, 0.5)]);
}

#[test]
fn accumulation_runs_along_the_curve() {
    let text = format!("{HEADER}[bench]\nname: ior\n[curve]\nxval: $N\nyval: $BW\noptions: accum\n");
    let model = layout(&text, vec![vec![numeric(&[(1.0, 1.0), (2.0, 2.0), (3.0, 3.0)])]]);
    assert_eq!(plotted(&model.graphs[0], 0), vec![(1.0, 1.0), (2.0, 3.0), (3.0, 6.0)]);
}

#[test]
fn aggregation_reports_bounds() {
    let text = format!("{HEADER}aggr: avg\n[bench]\nname: ior\n[curve]\nxval: $N\nyval: $BW\n");
    let model = layout(&text, vec![vec![numeric(&[(1.0, 10.0), (1.0, 20.0)])]]);

    let point = &model.graphs[0].points[0];
    assert_eq!(point.plotted_y, 15.0);
    assert_eq!((point.low, point.high), (10.0, 20.0));
    assert_eq!(point.raw_y, Value::Number(15.0));
}

#[test]
fn horizontal_bars_bucket_by_y() {
    let text = "[graph]\nxtype: linear\nytype: category\naggr: avg\n\
                [bench]\nname: ior\n[curve]\nxval: $BW\nyval: $OP\noptions: hbar\n";
    let model = layout(
        text,
        vec![vec![data(&[
            (Value::Number(1.0), Value::text("read")),
            (Value::Number(3.0), Value::text("read")),
        ])]],
    );

    let graph = &model.graphs[0];
    assert_eq!(graph.curves[0].direction, Direction::ByY);
    assert_eq!(plotted(graph, 0), vec![(2.0, 1.0)]);
}

#[test]
fn skip_lists_and_auto_styles() {
    let text = "[graph]\nxtype: linear\nytype: linear\nxskip: 2\n\
                [bench]\nname: ior\n\
                [curve]\nxval: $N\nyval: $BW\n\
                [curve]\nxval: $N\nyval: $BW\ncolor: red\n";
    let model = layout(
        text,
        vec![
            vec![numeric(&[(1.0, 1.0), (2.0, 2.0)]), numeric(&[(1.0, 5.0)])],
            vec![numeric(&[(1.0, 3.0)])],
        ],
    );

    let graph = &model.graphs[0];
    assert_eq!(plotted(graph, 0), vec![(1.0, 1.0)]);
    assert_eq!(graph.curves.len(), 3);
    assert_eq!(graph.curves[0].line.name(), "solid");
    assert_eq!(graph.curves[1].line.name(), "dashed");
    assert_eq!(graph.curves[1].mark.name(), "square");
    assert_eq!(graph.curves[2].color.name(), "red");
}
