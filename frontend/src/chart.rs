//! Monthly bar chart, one series per category.

use serde::Serialize;
use thiserror::Error;
use wasm_bindgen::prelude::*;

use crate::aggregate::Aggregation;
use crate::categories;
use crate::entry::MonthKey;

const MONTHS_SHORT: [&str; 12] = [
    "Jan", "Fév", "Mar", "Avr", "Mai", "Juin", "Juil", "Août", "Sept", "Oct", "Nov", "Déc",
];

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("chart canvas `{0}` not found")]
    MissingCanvas(String),
    #[error("chart config: {0}")]
    Config(#[from] serde_json::Error),
    #[error("chart library: {0}")]
    Js(String),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Dataset {
    pub label: String,
    pub data: Vec<f64>,
    #[serde(rename = "backgroundColor")]
    pub background_color: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
}

/// `2024-05` becomes `Mai 2024`.
pub fn month_label(month: &MonthKey) -> String {
    let name = MONTHS_SHORT
        .get(month.month().saturating_sub(1) as usize)
        .copied()
        .unwrap_or("?");
    format!("{} {}", name, month.year())
}

/// One dataset per category, in the aggregation's first-seen order, each
/// holding a value for every month of the axis.
pub fn project(aggregation: &Aggregation) -> ChartData {
    let datasets = aggregation
        .categories
        .iter()
        .map(|category| Dataset {
            label: categories::label(category).to_string(),
            data: aggregation
                .months
                .iter()
                .map(|month| aggregation.total(month, category))
                .collect(),
            background_color: categories::color(category).to_string(),
        })
        .collect();

    ChartData {
        labels: aggregation.months.iter().map(month_label).collect(),
        datasets,
    }
}

/// Something that can draw a chart and later tear it down.
pub trait ChartSurface {
    type Chart;

    fn create(&mut self, data: &ChartData) -> Result<Self::Chart, ChartError>;
    fn destroy(&mut self, chart: Self::Chart);
}

/// Owns the single live chart of a surface. Every rebuild destroys the
/// previous instance before the next one is created.
pub struct ChartSlot<S: ChartSurface> {
    surface: S,
    current: Option<S::Chart>,
}

impl<S: ChartSurface> ChartSlot<S> {
    pub fn new(surface: S) -> Self {
        ChartSlot {
            surface,
            current: None,
        }
    }

    pub fn replace(&mut self, data: &ChartData) -> Result<(), ChartError> {
        self.clear();
        let chart = self.surface.create(data)?;
        self.current = Some(chart);
        Ok(())
    }

    pub fn clear(&mut self) {
        if let Some(old) = self.current.take() {
            self.surface.destroy(old);
        }
    }

    pub fn is_drawn(&self) -> bool {
        self.current.is_some()
    }
}

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_name = Chart)]
    pub type JsChart;

    #[wasm_bindgen(constructor, js_class = "Chart", catch)]
    fn new(canvas: &JsValue, config: &JsValue) -> Result<JsChart, JsValue>;

    #[wasm_bindgen(method)]
    fn destroy(this: &JsChart);
}

/// Chart.js, loaded by the page, drawing into a canvas element.
pub struct ChartJsSurface {
    canvas_id: String,
}

impl ChartJsSurface {
    pub fn new(canvas_id: &str) -> Self {
        ChartJsSurface {
            canvas_id: canvas_id.to_string(),
        }
    }
}

fn bar_config(data: &ChartData) -> serde_json::Value {
    serde_json::json!({
        "type": "bar",
        "data": data,
        "options": {
            "responsive": true,
            "plugins": {
                "title": { "display": true }
            },
            "scales": {
                "x": { "stacked": false },
                "y": { "stacked": false, "beginAtZero": true }
            }
        }
    })
}

impl ChartSurface for ChartJsSurface {
    type Chart = JsChart;

    fn create(&mut self, data: &ChartData) -> Result<JsChart, ChartError> {
        let canvas = web_sys::window()
            .and_then(|w| w.document())
            .and_then(|d| d.get_element_by_id(&self.canvas_id))
            .ok_or_else(|| ChartError::MissingCanvas(self.canvas_id.clone()))?;

        let text = serde_json::to_string(&bar_config(data))?;
        let config = js_sys::JSON::parse(&text).map_err(|e| ChartError::Js(format!("{:?}", e)))?;
        JsChart::new(canvas.as_ref(), &config).map_err(|e| ChartError::Js(format!("{:?}", e)))
    }

    fn destroy(&mut self, chart: JsChart) {
        chart.destroy();
    }
}
