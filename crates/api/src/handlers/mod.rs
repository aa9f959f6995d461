pub mod duplicates;
pub mod match_rules;
pub mod tenants;
