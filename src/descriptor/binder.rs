use std::collections::BTreeMap;

use tracing::{debug, info};

use super::{BenchId, BenchNode, BindError, CurveId, CurveNode, Description, Filter, GraphId};
use crate::description::Location;
use crate::expr::{Bindings, EvaluationContext, ExprError, Formula, Segment, Sigil, evaluate, scan_sql_references};
use crate::store::{Benchmark, Field, Row, RowQuery, Store, canonical_name};
use crate::value::{AxisKey, Value};

/// Rows of one curve instance grouped both ways: x value to the y values
/// seen at it, and y value to the x values seen at it.
#[derive(Debug, Clone, Default)]
pub struct CurveData {
    pub label: String,
    pub mark_text: Option<String>,
    /// Field/value pairs of the iterate combination this instance stands for.
    pub iteration: Vec<(String, Value)>,
    pub by_x: BTreeMap<AxisKey, Vec<Value>>,
    pub by_y: BTreeMap<AxisKey, Vec<Value>>,
}

impl CurveData {
    pub fn is_empty(&self) -> bool {
        self.by_x.is_empty()
    }

    fn push(&mut self, x: Value, y: Value) {
        self.by_x.entry(AxisKey(x.clone())).or_default().push(y.clone());
        self.by_y.entry(AxisKey(y)).or_default().push(x);
    }
}

#[derive(Debug, Clone)]
pub struct BoundCurve {
    pub curve: CurveId,
    pub data: Vec<CurveData>,
}

#[derive(Debug, Clone)]
pub struct BoundBench {
    pub bench: BenchId,
    pub benchmark: Benchmark,
    pub curves: Vec<BoundCurve>,
}

#[derive(Debug, Clone)]
pub struct BoundGraph {
    pub graph: GraphId,
    pub benches: Vec<BoundBench>,
}

/// Runs every curve's queries against the store and evaluates its value
/// formulas row by row.
pub struct Binder<'a> {
    store: &'a Store,
    ctx: &'a EvaluationContext,
}

impl<'a> Binder<'a> {
    pub fn new(store: &'a Store, ctx: &'a EvaluationContext) -> Self {
        Self { store, ctx }
    }

    pub fn bind(&self, description: &Description) -> Result<Vec<BoundGraph>, BindError> {
        description
            .graphs
            .iter()
            .map(|graph| self.bind_graph(description, graph.id))
            .collect()
    }

    pub fn bind_graph(&self, description: &Description, id: GraphId) -> Result<BoundGraph, BindError> {
        let graph = description.graph(id);
        let benches = graph
            .benches
            .iter()
            .map(|bench| self.bind_bench(description, description.bench(*bench)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(BoundGraph { graph: id, benches })
    }

    fn bind_bench(&self, description: &Description, node: &BenchNode) -> Result<BoundBench, BindError> {
        let benchmark = self
            .store
            .find_benchmark(&node.name)
            .map_err(|err| BindError::store(&node.location, err))?
            .ok_or_else(|| BindError::UnknownBenchmark {
                location: node.location.clone(),
                name: node.name.clone(),
            })?;
        let fields = self
            .store
            .fields(&benchmark.name)
            .map_err(|err| BindError::store(&node.location, err))?;

        let mut base = RowQuery {
            predicates: Vec::new(),
            include_outliers: node.include_outliers,
        };
        for filter in &node.filters {
            base = base.with_predicate(self.translate_filter(filter, &benchmark, &fields)?);
        }
        for select in &node.selects {
            base = base.with_predicate(select.clone());
        }

        let curves = node
            .curves
            .iter()
            .map(|curve| self.bind_curve(description.curve(*curve), node, &benchmark, &fields, &base))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(BoundBench {
            bench: node.id,
            benchmark,
            curves,
        })
    }

    fn bind_curve(
        &self,
        curve: &CurveNode,
        bench: &BenchNode,
        benchmark: &Benchmark,
        fields: &[Field],
        base: &RowQuery,
    ) -> Result<BoundCurve, BindError> {
        let formulas = [Some(&curve.xval), Some(&curve.yval), curve.label.as_ref(), curve.mark_text.as_ref()];
        for formula in formulas.into_iter().flatten() {
            for column in formula.columns() {
                require_field(&column, &curve.location, benchmark, fields)?;
            }
        }

        let mut query = base.clone();
        for filter in &curve.filters {
            query = query.with_predicate(self.translate_filter(filter, benchmark, fields)?);
        }

        let mut iterated = Vec::with_capacity(curve.iterate.len());
        for name in &curve.iterate {
            let field = require_field(name, &curve.location, benchmark, fields)?;
            let values = self
                .store
                .distinct_values(&benchmark.name, &field.name, &query)
                .map_err(|err| BindError::store(&curve.location, err))?;
            iterated.push((field, values));
        }

        let mut data = Vec::new();
        for combination in cartesian_product(&iterated) {
            let mut instance_query = query.clone();
            for (field, value) in &combination {
                instance_query = instance_query.with_predicate(equality_predicate(field, value));
            }
            let rows = self
                .store
                .select_rows(&benchmark.name, &instance_query)
                .map_err(|err| BindError::store(&curve.location, err))?;

            let iteration = combination
                .into_iter()
                .map(|(field, value)| (field.name.clone(), value))
                .collect();
            data.push(self.curve_data(curve, bench, iteration, &rows)?);
        }
        if data.is_empty() {
            data.push(CurveData {
                label: default_label(curve, bench, &[]),
                ..CurveData::default()
            });
        }

        info!(
            bench = %benchmark.name,
            curve = curve.ordinal + 1,
            instances = data.len(),
            rows = data.iter().map(|instance| instance.by_x.values().map(Vec::len).sum::<usize>()).sum::<usize>(),
            "bound curve"
        );
        Ok(BoundCurve { curve: curve.id, data })
    }

    fn curve_data(
        &self,
        curve: &CurveNode,
        bench: &BenchNode,
        iteration: Vec<(String, Value)>,
        rows: &[Row],
    ) -> Result<CurveData, BindError> {
        let mut data = CurveData {
            label: default_label(curve, bench, &iteration),
            iteration,
            ..CurveData::default()
        };

        if let Some(first) = rows.first() {
            let bindings = Bindings::for_row(&first.values);
            if let Some(label) = &curve.label {
                data.label = self.evaluate(label, &bindings, &curve.location)?.to_string();
            }
            if let Some(mark_text) = &curve.mark_text {
                data.mark_text = Some(self.evaluate(mark_text, &bindings, &curve.location)?.to_string());
            }
        }

        for row in rows {
            let bindings = Bindings::for_row(&row.values);
            let x = self.evaluate(&curve.xval, &bindings, &curve.location)?;
            let y = self.evaluate(&curve.yval, &bindings, &curve.location)?;
            data.push(x, y);
        }
        Ok(data)
    }

    fn evaluate(&self, formula: &Formula, bindings: &Bindings<'_>, location: &Location) -> Result<Value, BindError> {
        formula
            .evaluate(self.ctx, bindings)
            .map_err(|err| BindError::expr(location, err))
    }

    /// Rewrites a filter fragment into a predicate over the wide table:
    /// column references become physical column names, environment and
    /// calculated references become SQL literals.
    fn translate_filter(&self, filter: &Filter, benchmark: &Benchmark, fields: &[Field]) -> Result<String, BindError> {
        let mut predicate = String::with_capacity(filter.text.len());
        for segment in scan_sql_references(&filter.text) {
            match segment {
                Segment::Literal(text) => predicate.push_str(&text),
                Segment::Reference { sigil, name } => match sigil {
                    Sigil::Column => {
                        let field = require_field(&name, &filter.location, benchmark, fields)?;
                        predicate.push_str(&field.column());
                    }
                    Sigil::Env => {
                        let value = self.ctx.env(&name).ok_or_else(|| {
                            BindError::expr(&filter.location, ExprError::UnknownVariable(name.clone()))
                        })?;
                        predicate.push_str(&Value::text(value).to_sql_literal());
                    }
                    Sigil::Calc => {
                        let expr = self.ctx.calculated(&name).ok_or_else(|| {
                            BindError::expr(&filter.location, ExprError::UnknownCalculated(name.clone()))
                        })?;
                        let value = evaluate(expr, self.ctx, &Bindings::empty())
                            .map_err(|err| BindError::expr(&filter.location, err))?;
                        predicate.push_str(&value.to_sql_literal());
                    }
                    Sigil::Func => {
                        return Err(BindError::invalid(
                            &filter.location,
                            format!("function call &{name} is not allowed in a filter"),
                        ));
                    }
                },
            }
        }
        debug!(filter = %filter.text, predicate = %predicate, "translated filter");
        Ok(predicate)
    }
}

fn require_field<'f>(
    name: &str,
    location: &Location,
    benchmark: &Benchmark,
    fields: &'f [Field],
) -> Result<&'f Field, BindError> {
    let unknown = || BindError::UnknownField {
        location: location.clone(),
        bench: benchmark.name.clone(),
        field: name.to_string(),
    };
    let canonical = canonical_name(name).map_err(|_| unknown())?;
    fields.iter().find(|field| field.name == canonical).ok_or_else(unknown)
}

/// Every combination of the iterated value sets, right-most field varying
/// fastest. No iterated fields gives one empty combination; a field with no
/// values gives none.
fn cartesian_product<'f>(sets: &[(&'f Field, Vec<Value>)]) -> Vec<Vec<(&'f Field, Value)>> {
    let mut combinations = vec![Vec::new()];
    for (field, values) in sets {
        combinations = combinations
            .into_iter()
            .flat_map(|prefix: Vec<(&'f Field, Value)>| {
                values.iter().map(move |value| {
                    let mut next = prefix.clone();
                    next.push((*field, value.clone()));
                    next
                })
            })
            .collect();
    }
    combinations
}

fn equality_predicate(field: &Field, value: &Value) -> String {
    let column = field.column();
    match value {
        Value::Null => format!("{column} IS NULL"),
        Value::Text(text) if !field.numeric => format!("{column} = '{}'", text.replace('\'', "''")),
        other => format!("{column} = {}", other.to_sql_literal()),
    }
}

fn default_label(curve: &CurveNode, bench: &BenchNode, iteration: &[(String, Value)]) -> String {
    let mut label = bench
        .label
        .clone()
        .unwrap_or_else(|| format!("curve {}", curve.ordinal + 1));
    for (_, value) in iteration {
        label.push(' ');
        label.push_str(&value.to_string());
    }
    label
}
