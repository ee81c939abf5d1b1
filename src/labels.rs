use crate::models::SensitivityLevel;

/// Description and example column names that steer the model toward a level.
pub struct LevelGuidance {
    pub description: &'static str,
    pub examples: &'static [&'static str],
}

/// Guidance for one assignable level. `Unclassified` has none: it is never offered.
pub fn guidance(level: SensitivityLevel) -> Option<LevelGuidance> {
    let g = match level {
        SensitivityLevel::Public => LevelGuidance {
            description: "Data that is generally available or poses very low risk if exposed. Can be shared widely.",
            examples: &[
                "product_id",
                "category_name",
                "public_website_url",
                "city_name",
                "country_code",
                "product_description",
                "timestamp_utc",
                "log_level",
            ],
        },
        SensitivityLevel::Internal => LevelGuidance {
            description: "Data for internal business use only. Not intended for public disclosure, but not highly sensitive.",
            examples: &[
                "employee_id",
                "internal_project_code",
                "department_name",
                "office_location",
                "internal_ticket_id",
                "system_status_message",
                "server_ip_address_internal",
                "application_version",
            ],
        },
        SensitivityLevel::Confidential => LevelGuidance {
            description: "Data requiring restricted access within the organization. Unauthorized disclosure could cause moderate harm.",
            examples: &[
                "salary_range",
                "performance_review_score",
                "unreleased_product_roadmap",
                "proprietary_algorithm_name",
                "business_strategy_document_id",
                "customer_segment_internal",
                "supplier_contract_id",
                "internal_audit_findings",
            ],
        },
        SensitivityLevel::Pii => LevelGuidance {
            description: "Personally Identifiable Information. Data that can directly or indirectly identify an individual.",
            examples: &[
                "email_address",
                "phone_number",
                "date_of_birth",
                "first_name",
                "last_name",
                "home_address",
                "social_security_number",
                "passport_number",
                "driver_license_id",
                "national_id",
                "medical_record_number",
                "ip_address_public",
                "device_id",
            ],
        },
        SensitivityLevel::FinanceCritical => LevelGuidance {
            description: "Data tied to financial transactions, assets or sensitive financial operations. Disclosure could lead to financial loss or fraud.",
            examples: &[
                "credit_card_number",
                "bank_account_number",
                "revenue_amount",
                "routing_number",
                "profit_margin",
                "transaction_value",
                "loan_amount",
                "tax_id_number",
                "invoice_id",
                "payment_gateway_token",
            ],
        },
        SensitivityLevel::Unclassified => return None,
    };
    Some(g)
}

/// Render the label block of the prompt, one line per level.
///
/// Examples are capped at `max_examples` per level to keep the prompt small.
pub fn render_guidance(max_examples: usize) -> String {
    let mut out = String::new();
    for level in SensitivityLevel::ASSIGNABLE {
        if let Some(g) = guidance(level) {
            out.push_str(&format!("- {}: {}", level.label(), g.description));
            let examples: Vec<&str> = g.examples.iter().take(max_examples).copied().collect();
            if !examples.is_empty() {
                out.push_str(&format!(" e.g. {}", examples.join(", ")));
            }
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_assignable_level_has_guidance() {
        for level in SensitivityLevel::ASSIGNABLE {
            assert!(guidance(level).is_some(), "{} has no guidance", level);
        }
        assert!(guidance(SensitivityLevel::Unclassified).is_none());
    }

    #[test]
    fn test_render_guidance_limits_examples() {
        let text = render_guidance(2);
        assert_eq!(text.lines().count(), 5);
        assert!(text.contains("- PII: "));
        assert!(text.contains("e.g. email_address, phone_number\n"));
        assert!(!text.contains("date_of_birth"));
    }

    #[test]
    fn test_render_guidance_without_examples() {
        let text = render_guidance(0);
        assert!(!text.contains("e.g."));
        assert!(text.contains("- Finance-critical: "));
    }
}
