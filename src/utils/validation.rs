//! Utilidades de validación
//!
//! Este módulo contiene funciones helper para validación de datos
//! compartidas entre el store y los servicios.

use validator::ValidationError;

/// Validar que un string no esté vacío ni sea solo espacios
pub fn validate_non_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("non_blank");
        error.add_param("value".into(), &value.to_string());
        return Err(error);
    }
    Ok(())
}

/// Validar una coordenada geográfica (lat -90..90, lon -180..180)
pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), ValidationError> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        let mut error = ValidationError::new("latitude");
        error.add_param("value".into(), &latitude);
        return Err(error);
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        let mut error = ValidationError::new("longitude");
        error.add_param("value".into(), &longitude);
        return Err(error);
    }
    Ok(())
}

/// Validar una magnitud no negativa (velocidad, precisión)
pub fn validate_non_negative(name: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value < 0.0 {
        let mut error = ValidationError::new(name);
        error.add_param("value".into(), &value);
        return Err(error);
    }
    Ok(())
}
