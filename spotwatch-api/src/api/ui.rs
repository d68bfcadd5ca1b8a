//! Human-readable pages
//!
//! Server-rendered HTML, no scripts. Anything that came from the store is
//! escaped before it is written into a page.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use serde_json::Value;
use spotwatch_common::{Error, Sensor, Spot};
use tracing::error;

use crate::AppState;

const STYLE: &str = r#"
        body {
            font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif;
            background-color: #1a1a1a;
            color: #e0e0e0;
            line-height: 1.6;
            margin: 0;
        }
        header {
            background-color: #2a2a2a;
            border-bottom: 1px solid #3a3a3a;
            padding: 20px;
        }
        h1 { color: #4a9eff; font-size: 26px; margin: 0; }
        main { padding: 20px; }
        a { color: #4a9eff; }
        code, pre { font-family: 'Courier New', monospace; color: #c0c0c0; }
        table { border-collapse: collapse; }
        th, td { border: 1px solid #3a3a3a; padding: 6px 12px; text-align: left; }
        .free { color: #4caf50; }
        .occupied { color: #f44336; }
"#;

/// Escape text for HTML element content and attribute values
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>{STYLE}</style>
</head>
<body>
    <header><h1>{title}</h1></header>
    <main>
{body}
    </main>
</body>
</html>"#,
        title = escape_html(title),
    )
}

fn reading_text(value: &Value) -> String {
    match value {
        Value::Null => "none".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// GET /
pub async fn serve_home() -> Html<String> {
    let body = r#"        <p>Live occupancy for every tracked parking spot.</p>
        <ul>
            <li><a href="/data/view/spots">Spot overview</a></li>
            <li><a href="/data">Data API guide</a></li>
        </ul>"#;
    Html(page("Spotwatch", body))
}

/// GET /data
pub async fn serve_data_guide() -> Html<String> {
    let body = r#"        <p>All endpoints exchange JSON objects. Sensor writes authenticate with a
        <code>key</code> field in the body; the key is never returned.</p>
        <h2>Sensors</h2>
        <ul>
            <li><code>GET /data/sensors</code> list registered sensors</li>
            <li><code>GET /data/sensor/{id}</code> read one sensor</li>
            <li><code>POST /data/sensor/init/{id}</code> register a sensor; body needs
                <code>type</code>, <code>spot</code> and <code>key</code></li>
            <li><code>POST /data/sensor/{id}</code> report a reading or change fields;
                an unknown id is registered</li>
            <li><code>GET /data/sensor/{id}/spot</code> the spot a sensor belongs to</li>
            <li><code>POST /data/sensor/{id}/spot</code> move a sensor; body
                <code>{"key": "...", "spot": "..."}</code></li>
        </ul>
        <h2>Spots</h2>
        <ul>
            <li><code>GET /data/spots</code>, <code>GET /data/spot/{id}</code></li>
            <li><code>GET /data/spot/{id}/free</code> current occupancy</li>
            <li><code>GET /data/spot/{id}/sensors</code> member sensors</li>
        </ul>
        <h2>Plates</h2>
        <ul>
            <li><code>GET /data/plates</code>, <code>GET /data/plates/{id}</code></li>
            <li><code>POST /data/plates/{id}</code>, <code>DELETE /data/plates/{id}</code></li>
        </ul>
        <h2>Example</h2>
        <pre>curl -X POST localhost:8080/data/sensor/init/s1 \
     -d '{"type": "ultrasonic", "spot": "A1", "key": "secret"}'
curl -X POST localhost:8080/data/sensor/s1 -d '{"key": "secret", "value": 1}'</pre>"#;
    Html(page("Spotwatch data API", body))
}

fn render_sensor(sensor: &Sensor) -> String {
    let spot = match &sensor.spot {
        Some(spot_id) => escape_html(spot_id),
        None => "unassigned".to_string(),
    };
    let mut fields = vec![
        ("Type".to_string(), escape_html(&sensor.sensor_type)),
        ("Reading".to_string(), escape_html(&reading_text(&sensor.value))),
        ("Spot".to_string(), spot),
    ];
    for (field, value) in &sensor.extra {
        fields.push((escape_html(field), escape_html(&reading_text(value))));
    }

    let rows: String = fields
        .iter()
        .map(|(name, value)| format!("            <tr><th>{name}</th><td>{value}</td></tr>\n"))
        .collect();
    format!("        <table>\n{rows}        </table>")
}

fn render_spots(spots: &[Spot]) -> String {
    if spots.is_empty() {
        return "        <p>No spots yet.</p>".to_string();
    }

    let mut rows = String::new();
    for spot in spots {
        let (class, state) = if spot.free {
            ("free", "free")
        } else {
            ("occupied", "occupied")
        };
        let members = spot
            .sensors
            .sensor_ids()
            .map(|id| {
                let id = escape_html(id);
                format!(r#"<a href="/data/view/{id}">{id}</a>"#)
            })
            .collect::<Vec<_>>()
            .join(", ");
        rows.push_str(&format!(
            "            <tr><td>{}</td><td class=\"{class}\">{state}</td><td>{members}</td></tr>\n",
            escape_html(&spot.id),
        ));
    }
    format!(
        "        <table>\n            <tr><th>Spot</th><th>State</th><th>Sensors</th></tr>\n{rows}        </table>"
    )
}

fn error_page(err: Error) -> Response {
    let status = match &err {
        Error::NotFound(_) | Error::Validation { .. } => StatusCode::NOT_FOUND,
        _ => {
            error!("Failed to render page: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    let body = format!("        <p>{}</p>", escape_html(&err.to_string()));
    (status, Html(page("Spotwatch", &body))).into_response()
}

/// GET /data/view/spots
pub async fn serve_spots_view(State(state): State<AppState>) -> Response {
    match state.spots.list().await {
        Ok(spots) => Html(page("Parking spots", &render_spots(&spots))).into_response(),
        Err(e) => error_page(e),
    }
}

/// GET /data/view/:id
pub async fn serve_sensor_view(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    match state.sensors.get(&id).await {
        Ok(sensor) => {
            let title = format!("Sensor {}", sensor.id);
            Html(page(&title, &render_sensor(&sensor))).into_response()
        }
        Err(e) => error_page(e),
    }
}
