use tabled::Tabled;

#[derive(Tabled)]
pub struct OperationRow {
    pub operation_id: String,
    pub total_operations: usize,
    pub errors: usize,
    #[tabled(display = "float2")]
    pub avg_time_ms: f64,
    #[tabled(display = "optional_float2")]
    pub min_time_ms: Option<f64>,
    #[tabled(display = "optional_float2")]
    pub max_time_ms: Option<f64>,
}

fn float2(n: &f64) -> String {
    format!("{:.2}", n)
}

fn optional_float2(n: &Option<f64>) -> String {
    match n {
        Some(n) => float2(n),
        None => "-".to_string(),
    }
}
