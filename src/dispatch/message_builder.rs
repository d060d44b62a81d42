use minijinja::Environment;
use minijinja::context;

use crate::entity::AvailabilityVerdict;

const ALERT_TEMPLATE: &str = "\
🎯 CISIA Alert: {{ product }} spots available!

{% for spot in spots %}
📍 {{ spot.test_type }}
{% if spot.venue %}
🏛️ University: {{ spot.venue }}
{% endif %}
{% if spot.city or spot.region %}
📌 City: {{ spot.city }}{% if spot.city and spot.region %}, {% endif %}{{ spot.region }}
{% endif %}
💺 Seats: {{ spot.seats_text }}
{% if spot.test_date %}
📅 Test Date: {{ spot.test_date }}
{% endif %}
{% if spot.deadline %}
⏰ Deadline: {{ spot.deadline }}
{% endif %}
{% if spot.status %}
✅ Status: {{ spot.status }}
{% endif %}

{% endfor %}
🔗 Book now: {{ check_url }}";

/// Renders the alert text sent on a rising edge.
pub struct AlertMessageBuilder {
    env: Environment<'static>,
    product: String,
    check_url: String,
}

impl AlertMessageBuilder {
    pub fn new(product: impl Into<String>, check_url: impl Into<String>) -> Self {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        Self {
            env,
            product: product.into(),
            check_url: check_url.into(),
        }
    }

    /// Builds the message, listing every spot when details are known.
    pub fn build(&self, verdict: &AvailabilityVerdict) -> String {
        if verdict.spots.is_empty() {
            return self.summary();
        }
        self.env
            .render_str(
                ALERT_TEMPLATE,
                context! {
                    product => &self.product,
                    check_url => &self.check_url,
                    spots => &verdict.spots,
                },
            )
            .unwrap_or_else(|e| {
                log::error!("Failed to render alert template: {e}");
                self.summary()
            })
    }

    /// Single-line alert used when no spot details are available.
    pub fn summary(&self) -> String {
        format!(
            "🚨 CISIA Alert: {} spots available!\n📅 Check: {}",
            self.product, self.check_url
        )
    }
}
