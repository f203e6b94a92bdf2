use vigil_detector::Detection;

/// Render the anomalous detections as JSON lines, each ending in `\n`.
///
/// Normal detections are left out; an empty string means nothing to emit.
pub fn render_anomalies(detections: &[Detection]) -> serde_json::Result<String> {
    let mut out = String::new();
    for detection in detections.iter().filter(|d| d.metric.is_anomalous()) {
        out.push_str(&serde_json::to_string(detection)?);
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::{Metric, Trend};

    fn detection(name: &str, score: f64, trend: Trend) -> Detection {
        let mut metric = Metric::new(name, 1.0);
        metric.score = score;
        metric.trend = trend;
        Detection {
            rule_id: "r1".to_string(),
            pattern: "a.*".to_string(),
            metric,
        }
    }

    #[test]
    fn only_anomalies_are_rendered() {
        let out = render_anomalies(&[
            detection("a.quiet", 0.5, Trend::Normal),
            detection("a.spike", 4.2, Trend::Up),
        ])
        .unwrap();

        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 1);

        let json: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(json["rule_id"], "r1");
        assert_eq!(json["pattern"], "a.*");
        assert_eq!(json["metric"]["name"], "a.spike");
        assert_eq!(json["metric"]["trend"], "up");
        assert_eq!(json["metric"]["score"], 4.2);
    }

    #[test]
    fn nothing_to_emit() {
        assert_eq!(render_anomalies(&[]).unwrap(), "");
    }
}
