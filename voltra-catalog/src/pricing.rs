use crate::product::Product;

/// Specification attribute driving the per-watt-peak price conversion.
pub const MODULE_POWER_PARAM: &str = "Module Power";

/// Whether an offer on this product may be priced per watt-peak: the raw
/// "Module Power" value must parse as a positive number. Datasheet values
/// with unit suffixes ("550 W") do not qualify here even though the
/// conversion below would strip them; the precondition is deliberately
/// stricter than the conversion.
pub fn supports_wp_pricing(product: &Product) -> bool {
    product
        .parameter_value(MODULE_POWER_PARAM)
        .and_then(|raw| raw.trim().parse::<f64>().ok())
        .map(|power| power > 0.0)
        .unwrap_or(false)
}

/// Module power as used by the conversion: strip everything outside
/// `[0-9.]`, then truncate to a whole number of watts.
fn module_power(product: &Product) -> i64 {
    let raw = product.parameter_value(MODULE_POWER_PARAM).unwrap_or("");
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
    digits.parse::<f64>().map(|p| p.trunc() as i64).unwrap_or(0)
}

/// Convert a per-watt-peak price into an absolute price using the product's
/// rated module power, rounded to 3 decimal places. Returns 0 (and logs)
/// when the product carries no usable module power.
pub fn price_from_wp(product: &Product, price_wp: f64) -> f64 {
    let power = module_power(product);

    if power == 0 {
        tracing::error!(
            product_id = %product.id,
            module_power_raw = ?product.parameter_value(MODULE_POWER_PARAM),
            "module power not found, cannot convert Wp price"
        );
        return 0.0;
    }

    round3(price_wp * power as f64)
}

/// Minimum price among an offer's tiers, or None when there are no tiers.
pub fn lowest_price(prices: &[f64]) -> Option<f64> {
    prices.iter().copied().min_by(f64::total_cmp)
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::{ProductParameter, ProductStatus};
    use chrono::Utc;
    use uuid::Uuid;

    fn module(power: Option<&str>) -> Product {
        Product {
            id: Uuid::new_v4(),
            name: "JXS-550".to_string(),
            status: ProductStatus::Active,
            parameters: power
                .map(|value| {
                    vec![ProductParameter {
                        name: MODULE_POWER_PARAM.to_string(),
                        value: value.to_string(),
                    }]
                })
                .unwrap_or_default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn converts_wp_price_with_numeric_power() {
        let product = module(Some("550"));
        assert_eq!(price_from_wp(&product, 0.173), 95.15);
        assert_eq!(price_from_wp(&product, 0.2), 110.0);
    }

    #[test]
    fn strips_non_numeric_characters_and_truncates() {
        // "550.9 W" -> 550.9 -> 550 watts
        let product = module(Some("550.9 W"));
        assert_eq!(price_from_wp(&product, 1.0), 550.0);
    }

    #[test]
    fn rounds_to_three_decimals() {
        let product = module(Some("3"));
        assert_eq!(price_from_wp(&product, 0.11115), 0.333);
    }

    #[test]
    fn missing_or_zero_power_yields_zero() {
        assert_eq!(price_from_wp(&module(None), 0.2), 0.0);
        assert_eq!(price_from_wp(&module(Some("0")), 0.2), 0.0);
        assert_eq!(price_from_wp(&module(Some("n/a")), 0.2), 0.0);
    }

    #[test]
    fn wp_precondition_requires_raw_numeric_value() {
        assert!(supports_wp_pricing(&module(Some("550"))));
        assert!(supports_wp_pricing(&module(Some(" 550.5 "))));
        // The conversion would strip the suffix, the precondition does not.
        assert!(!supports_wp_pricing(&module(Some("550 W"))));
        assert!(!supports_wp_pricing(&module(Some("0"))));
        assert!(!supports_wp_pricing(&module(None)));
    }

    #[test]
    fn lowest_price_is_none_without_tiers() {
        assert_eq!(lowest_price(&[]), None);
        assert_eq!(lowest_price(&[95.15, 93.0, 101.4]), Some(93.0));
    }
}
