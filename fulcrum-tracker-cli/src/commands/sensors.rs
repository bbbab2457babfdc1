use anyhow::Result;
use serde_json::Value;

use crate::api::ApiClient;
use crate::models::SensorState;

pub async fn list_sensors(client: &ApiClient, json: bool) -> Result<()> {
    let sensors = client.sensors().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&sensors)?);
    } else {
        println!("{}", format_sensor_table(&sensors));
    }
    Ok(())
}

pub async fn show_sensor(client: &ApiClient, key: &str, json: bool) -> Result<()> {
    let sensor = client.sensor(key).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&sensor)?);
    } else {
        println!("{}", format_sensor_detail(&sensor));
    }
    Ok(())
}

pub fn format_sensor_table(sensors: &[SensorState]) -> String {
    if sensors.is_empty() {
        return "No sensors published".to_string();
    }

    let width = sensors.iter().map(|s| s.key.len()).max().unwrap_or(0);
    sensors
        .iter()
        .map(|s| format!("{:<width$}  {}", s.key, s.display_state(), width = width))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_sensor_detail(sensor: &SensorState) -> String {
    let mut lines = vec![
        format!("{} ({})", sensor.name, sensor.key),
        "────────────────────────────────".to_string(),
        format!("  State: {}", sensor.display_state()),
    ];

    if !sensor.attributes.is_empty() {
        lines.push("  Attributes:".to_string());
        for (name, value) in &sensor.attributes {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            lines.push(format!("    {}: {}", name, value));
        }
    }

    lines.join("\n")
}
