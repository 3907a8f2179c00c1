use std::io::{self, Write};
use std::time::Duration;

use colored::*;
use rand::Rng;
use serde_json::{json, Value};
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "🚌 Bus Presence Testing Tool".bright_blue().bold());
    println!("{}", "=====================================".bright_blue());
    println!();

    // Paso 1: URL del servidor
    let base_url = get_base_url()?;
    let client = reqwest::Client::new();

    // Identidad del conductor simulado para toda la sesión
    let driver_id = Uuid::new_v4();
    println!(
        "{} {}",
        "👤 Conductor simulado:".bright_cyan(),
        driver_id.to_string().bright_white()
    );

    // Paso 2: Menú principal
    loop {
        println!();
        println!("{}", "📋 MENÚ PRINCIPAL".bright_green().bold());
        println!("{}", "==================".bright_green());
        println!("1. 🚍 Registrar vehículo");
        println!("2. 🔍 Listar flota");
        println!("3. ▶️  Iniciar sesión de presencia");
        println!("4. 📍 Simular conducción (empujar posiciones)");
        println!("5. ⏹️  Detener sesión");
        println!("6. 🚪 Salir");
        print!("{}", "Selecciona una opción (1-6): ".bright_yellow());
        io::stdout().flush()?;

        let mut choice = String::new();
        io::stdin().read_line(&mut choice)?;
        let choice = choice.trim();

        let result = match choice {
            "1" => register_vehicle(&client, &base_url).await,
            "2" => list_fleet(&client, &base_url).await,
            "3" => start_session(&client, &base_url, driver_id).await,
            "4" => simulate_driving(&client, &base_url, driver_id).await,
            "5" => stop_session(&client, &base_url, driver_id).await,
            "6" => {
                println!("{}", "👋 ¡Hasta luego!".bright_green());
                break;
            }
            _ => {
                println!("{}", "❌ Opción inválida. Intenta de nuevo.".bright_red());
                continue;
            }
        };

        if let Err(e) = result {
            println!("{} {}", "❌ Error:".bright_red(), e);
        }
    }

    Ok(())
}

fn get_base_url() -> Result<String, Box<dyn std::error::Error>> {
    print!(
        "{}",
        "URL del servidor (enter = http://localhost:3000): ".bright_yellow()
    );
    io::stdout().flush()?;
    let mut url = String::new();
    io::stdin().read_line(&mut url)?;
    let url = url.trim();
    Ok(if url.is_empty() {
        "http://localhost:3000".to_string()
    } else {
        url.to_string()
    })
}

fn prompt(label: &str) -> Result<String, Box<dyn std::error::Error>> {
    print!("{}", format!("{}: ", label).bright_yellow());
    io::stdout().flush()?;
    let mut value = String::new();
    io::stdin().read_line(&mut value)?;
    Ok(value.trim().to_string())
}

async fn register_vehicle(
    client: &reqwest::Client,
    base_url: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let name = prompt("Nombre (ej: Campus Express)")?;
    let route_label = prompt("Ruta (ej: R12)")?;
    let capacity = prompt("Capacidad (enter = sin especificar)")?;

    let mut body = json!({ "name": name, "route_label": route_label });
    if !capacity.is_empty() {
        body["capacity"] = json!(capacity.parse::<u32>()?);
    }

    let response = client
        .post(format!("{}/api/vehicle", base_url))
        .json(&body)
        .send()
        .await?;
    print_response(response).await
}

async fn list_fleet(
    client: &reqwest::Client,
    base_url: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let response = client
        .get(format!("{}/api/vehicle", base_url))
        .send()
        .await?;
    let vehicles: Value = response.json().await?;

    println!("{}", "🚍 FLOTA".bright_cyan().bold());
    for vehicle in vehicles.as_array().unwrap_or(&Vec::new()) {
        let active = if vehicle["is_active"].as_bool().unwrap_or(false) {
            "EN RUTA".bright_green()
        } else {
            "inactivo".bright_black()
        };
        println!(
            "  {} [{}] {} - {}",
            vehicle["id"].as_str().unwrap_or("?"),
            vehicle["route_label"].as_str().unwrap_or("?"),
            vehicle["name"].as_str().unwrap_or("?"),
            active
        );
        if !vehicle["last_location"].is_null() {
            println!(
                "      último punto: ({}, {}) a {} m/s",
                vehicle["last_location"]["latitude"],
                vehicle["last_location"]["longitude"],
                vehicle["last_location"]["speed"]
            );
        }
    }
    Ok(())
}

async fn start_session(
    client: &reqwest::Client,
    base_url: &str,
    driver_id: Uuid,
) -> Result<(), Box<dyn std::error::Error>> {
    let vehicle_id = prompt("ID del vehículo")?;

    let response = client
        .post(format!("{}/api/presence/start", base_url))
        .json(&json!({ "vehicle_id": vehicle_id, "driver_id": driver_id }))
        .send()
        .await?;
    print_response(response).await
}

async fn simulate_driving(
    client: &reqwest::Client,
    base_url: &str,
    driver_id: Uuid,
) -> Result<(), Box<dyn std::error::Error>> {
    let count: u32 = prompt("Cuántas muestras (ej: 20)")?.parse().unwrap_or(20);

    let mut latitude = 12.9716;
    let mut longitude = 77.5946;

    println!(
        "{}",
        format!("📍 Empujando {} muestras cada 500 ms...", count).bright_cyan()
    );
    for i in 0..count {
        let (lat_jitter, lon_jitter, speed, accuracy) = {
            let mut rng = rand::thread_rng();
            (
                rng.gen_range(-0.0005..0.0005),
                rng.gen_range(-0.0005..0.0005),
                rng.gen_range(0.0..16.0),
                rng.gen_range(3.0..15.0),
            )
        };
        latitude += lat_jitter;
        longitude += lon_jitter;

        let response = client
            .post(format!("{}/api/presence/position", base_url))
            .json(&json!({
                "driver_id": driver_id,
                "latitude": latitude,
                "longitude": longitude,
                "speed": speed,
                "accuracy": accuracy
            }))
            .send()
            .await?;

        if response.status().is_success() {
            println!("  {} muestra {} ({:.5}, {:.5})", "✅".green(), i + 1, latitude, longitude);
        } else {
            let body: Value = response.json().await?;
            println!("  {} muestra {} rechazada: {}", "❌".red(), i + 1, body["message"]);
            break;
        }

        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    Ok(())
}

async fn stop_session(
    client: &reqwest::Client,
    base_url: &str,
    driver_id: Uuid,
) -> Result<(), Box<dyn std::error::Error>> {
    let response = client
        .post(format!("{}/api/presence/stop", base_url))
        .json(&json!({ "driver_id": driver_id }))
        .send()
        .await?;
    print_response(response).await
}

async fn print_response(response: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = response.status();
    let body: Value = response.json().await?;
    if status.is_success() {
        println!(
            "{}\n{}",
            "✅ OK".bright_green(),
            serde_json::to_string_pretty(&body)?
        );
    } else {
        println!(
            "{} {}\n{}",
            "❌".bright_red(),
            status,
            serde_json::to_string_pretty(&body)?
        );
    }
    Ok(())
}
