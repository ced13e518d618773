//! Customer import module.

use serde_json::json;

use crate::config::{FieldDefinition, FieldType, ImportModuleConfig};

pub fn config() -> ImportModuleConfig {
    let schema = vec![
        FieldDefinition::new("customer_code", FieldType::String)
            .required()
            .describe("Unique customer identifier code")
            .patterns(&[
                r"(customer[_\s-]?(code|id|number|num|#)?|cust[_\s-]?(code|id))$",
                r"(client[_\s-]?(code|id)|account[_\s-]?(code|id|number|num))$",
                r"(vendor[_\s-]?(code|id)|company[_\s-]?(code|id))$",
            ]),
        FieldDefinition::new("name", FieldType::String)
            .required()
            .describe("Company/customer name")
            .patterns(&[
                r"(name|company[_\s-]?name|customer[_\s-]?name|business[_\s-]?name)$",
                r"(company|customer|client|vendor|account)[_\s-]?name$",
                r"(full[_\s-]?name|legal[_\s-]?name|dba)$",
            ]),
        FieldDefinition::new("website", FieldType::String)
            .describe("Company website URL")
            .patterns(&[
                r"(website|web[_\s-]?site|url|web[_\s-]?address|homepage)$",
                r"(company[_\s-]?website|www)$",
            ]),
        FieldDefinition::new("contact_name", FieldType::String)
            .describe("Primary contact person name")
            .patterns(&[
                r"(contact[_\s-]?name|contact[_\s-]?person|primary[_\s-]?contact)$",
                r"(contact|rep|representative)$",
                // First/last columns map here; combining them is AI territory
                r"(first[_\s-]?name|last[_\s-]?name)$",
            ]),
        FieldDefinition::new("contact_phone", FieldType::String)
            .describe("Primary contact phone number")
            .patterns(&[
                r"(contact[_\s-]?phone|phone[_\s-]?number|phone|telephone|tel)$",
                r"(primary[_\s-]?phone|main[_\s-]?phone|work[_\s-]?phone|office[_\s-]?phone)$",
                r"(mobile|cell|cell[_\s-]?phone)$",
            ]),
        FieldDefinition::new("contact_email", FieldType::String)
            .describe("Primary contact email address")
            .patterns(&[
                r"(contact[_\s-]?email|email[_\s-]?address|email|e[_\s-]?mail)$",
                r"(primary[_\s-]?email|main[_\s-]?email|work[_\s-]?email)$",
            ]),
        FieldDefinition::new("address_line1", FieldType::String)
            .describe("Street address line 1")
            .patterns(&[
                r"(address[_\s-]?(line)?[_\s-]?1?|street[_\s-]?address|street)$",
                r"(address|addr|mailing[_\s-]?address|shipping[_\s-]?address)$",
            ]),
        FieldDefinition::new("address_line2", FieldType::String)
            .describe("Street address line 2 (suite, unit, etc.)")
            .patterns(&[
                r"(address[_\s-]?(line)?[_\s-]?2|street[_\s-]?address[_\s-]?2)$",
                r"(suite|unit|apt|apartment|floor|building)$",
            ]),
        FieldDefinition::new("city", FieldType::String)
            .describe("City name")
            .patterns(&[r"(city|town|municipality|locality)$"]),
        FieldDefinition::new("state", FieldType::String)
            .describe("State or province")
            .patterns(&[
                r"(state|province|region|st)$",
                r"(state[_\s-]?province|state[_\s-]?code)$",
            ]),
        FieldDefinition::new("postal_code", FieldType::String)
            .describe("ZIP or postal code")
            .patterns(&[r"(postal[_\s-]?code|post[_\s-]?code|zip[_\s-]?code|zip|postcode)$"]),
        FieldDefinition::new("country", FieldType::String)
            .describe("Country (defaults to USA)")
            .patterns(&[r"(country|nation|country[_\s-]?code)$"]),
    ];

    let mut config = ImportModuleConfig::new("customers", "customers", schema);
    config.unique_fields = vec!["customer_code".to_string(), "name".to_string()];
    config.domain_hints = [
        "customer", "client", "vendor", "company", "business", "contact", "phone", "email",
        "address", "city", "state", "zip",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    config.default_values = vec![("country".to_string(), json!("USA"))];
    config
}
