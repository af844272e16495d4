//! Stateless validation of incoming requests.
//!
//! Pure shape and range checks; state-dependent guards live with the
//! orchestrator. Violations name the offending field so operators can fix
//! requests without guesswork.

use std::collections::HashMap;

use crate::error::ControlPlaneError;
use crate::requests::{CreateVmRequest, UpdateVmRequest};
use limiquantix_domain::VmSpec;

const MAX_NAME_LEN: usize = 255;
const MAX_DESCRIPTION_LEN: usize = 1000;
const MAX_LABELS: usize = 50;
const MAX_LABEL_KEY_LEN: usize = 63;
const MAX_LABEL_VALUE_LEN: usize = 255;
const CPU_CORES_RANGE: (u32, u32) = (1, 256);
const MEMORY_MIB_RANGE: (u64, u64) = (256, 1_048_576);
const DISK_GIB_RANGE: (u64, u64) = (1, 65_536);

/// A single validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Turn violations into the error surfaced to the caller.
///
/// The first violation wins; its field name is part of the message.
pub fn into_error(violations: Vec<FieldViolation>) -> Result<(), ControlPlaneError> {
    match violations.into_iter().next() {
        Some(violation) => Err(ControlPlaneError::invalid_argument(
            violation.field,
            violation.message,
        )),
        None => Ok(()),
    }
}

/// Validate a create request.
pub fn validate_create(req: &CreateVmRequest) -> Vec<FieldViolation> {
    let mut violations = Vec::new();
    validate_name("name", &req.name, &mut violations);
    validate_description("description", &req.description, &mut violations);
    validate_labels("labels", &req.labels, &mut violations);
    validate_spec("spec", &req.spec, &mut violations);
    violations
}

/// Validate an update request.
pub fn validate_update(req: &UpdateVmRequest) -> Vec<FieldViolation> {
    let mut violations = Vec::new();
    validate_id("vm_id", &req.vm_id, &mut violations);
    if let Some(description) = &req.description {
        validate_description("description", description, &mut violations);
    }
    if let Some(labels) = &req.labels {
        validate_labels("labels", labels, &mut violations);
    }
    if let Some(cpu) = &req.cpu {
        validate_cpu_cores("cpu.cores", cpu.cores, &mut violations);
    }
    if let Some(memory) = &req.memory {
        validate_memory_mib("memory.size_mib", memory.size_mib, &mut violations);
    }
    violations
}

/// Validate a VM name used for create and clone.
pub fn validate_vm_name(name: &str) -> Vec<FieldViolation> {
    let mut violations = Vec::new();
    validate_name("name", name, &mut violations);
    violations
}

/// Validate a referenced id.
pub fn validate_vm_id(vm_id: &str) -> Vec<FieldViolation> {
    let mut violations = Vec::new();
    validate_id("vm_id", vm_id, &mut violations);
    violations
}

/// Validate a disk size.
pub fn validate_disk_size(field: &str, size_gib: u64) -> Vec<FieldViolation> {
    let mut violations = Vec::new();
    validate_disk_gib(field, size_gib, &mut violations);
    violations
}

fn validate_id(field: &str, id: &str, violations: &mut Vec<FieldViolation>) {
    if id.is_empty() {
        violations.push(FieldViolation::new(field, "must not be empty"));
    }
}

fn validate_name(field: &str, name: &str, violations: &mut Vec<FieldViolation>) {
    if name.is_empty() {
        violations.push(FieldViolation::new(field, "must not be empty"));
        return;
    }
    if name.len() > MAX_NAME_LEN {
        violations.push(FieldViolation::new(
            field,
            format!("must be at most {MAX_NAME_LEN} characters"),
        ));
        return;
    }

    let mut chars = name.chars();
    let starts_alpha = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    let rest_valid = chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !starts_alpha || !rest_valid {
        violations.push(FieldViolation::new(
            field,
            "must start with a letter and contain only letters, digits, '_' and '-'",
        ));
    }
}

fn validate_description(field: &str, description: &str, violations: &mut Vec<FieldViolation>) {
    if description.len() > MAX_DESCRIPTION_LEN {
        violations.push(FieldViolation::new(
            field,
            format!("must be at most {MAX_DESCRIPTION_LEN} characters"),
        ));
    }
}

fn validate_labels(
    field: &str,
    labels: &HashMap<String, String>,
    violations: &mut Vec<FieldViolation>,
) {
    if labels.len() > MAX_LABELS {
        violations.push(FieldViolation::new(
            field,
            format!("must contain at most {MAX_LABELS} entries"),
        ));
    }
    for (key, value) in labels {
        if key.len() > MAX_LABEL_KEY_LEN {
            violations.push(FieldViolation::new(
                format!("{field}.{key}"),
                format!("key must be at most {MAX_LABEL_KEY_LEN} characters"),
            ));
        }
        if value.len() > MAX_LABEL_VALUE_LEN {
            violations.push(FieldViolation::new(
                format!("{field}.{key}"),
                format!("value must be at most {MAX_LABEL_VALUE_LEN} characters"),
            ));
        }
    }
}

fn validate_spec(field: &str, spec: &VmSpec, violations: &mut Vec<FieldViolation>) {
    validate_cpu_cores(&format!("{field}.cpu.cores"), spec.cpu.cores, violations);
    validate_memory_mib(
        &format!("{field}.memory.size_mib"),
        spec.memory.size_mib,
        violations,
    );
    for (idx, disk) in spec.disks.iter().enumerate() {
        validate_disk_gib(
            &format!("{field}.disks[{idx}].size_gib"),
            disk.size_gib,
            violations,
        );
    }
}

fn validate_cpu_cores(field: &str, cores: u32, violations: &mut Vec<FieldViolation>) {
    let (min, max) = CPU_CORES_RANGE;
    if !(min..=max).contains(&cores) {
        violations.push(FieldViolation::new(
            field,
            format!("must be between {min} and {max}"),
        ));
    }
}

fn validate_memory_mib(field: &str, size_mib: u64, violations: &mut Vec<FieldViolation>) {
    let (min, max) = MEMORY_MIB_RANGE;
    if !(min..=max).contains(&size_mib) {
        violations.push(FieldViolation::new(
            field,
            format!("must be between {min} and {max} MiB"),
        ));
    }
}

fn validate_disk_gib(field: &str, size_gib: u64, violations: &mut Vec<FieldViolation>) {
    let (min, max) = DISK_GIB_RANGE;
    if !(min..=max).contains(&size_gib) {
        violations.push(FieldViolation::new(
            field,
            format!("must be between {min} and {max} GiB"),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use limiquantix_domain::{CpuSpec, DiskSpec, MemorySpec};

    fn valid_request() -> CreateVmRequest {
        CreateVmRequest {
            name: "web-1".to_string(),
            spec: VmSpec {
                cpu: CpuSpec {
                    cores: 2,
                    ..Default::default()
                },
                memory: MemorySpec {
                    size_mib: 2048,
                    ..Default::default()
                },
                disks: vec![DiskSpec {
                    name: "disk-0".to_string(),
                    size_gib: 20,
                    boot_order: 1,
                    ..Default::default()
                }],
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_request_passes() {
        assert!(validate_create(&valid_request()).is_empty());
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut req = valid_request();
        req.name = String::new();
        let violations = validate_create(&req);
        assert_eq!(violations[0].field, "name");
    }

    #[test]
    fn test_name_shape_rejected() {
        for bad in ["1vm", "-vm", "vm with spaces", "vm.dot"] {
            let mut req = valid_request();
            req.name = bad.to_string();
            assert!(!validate_create(&req).is_empty(), "{bad} should be rejected");
        }
        for good in ["vm", "Vm-1", "a_b-c9"] {
            let mut req = valid_request();
            req.name = good.to_string();
            assert!(validate_create(&req).is_empty(), "{good} should pass");
        }
    }

    #[test]
    fn test_name_too_long_rejected() {
        let mut req = valid_request();
        req.name = format!("a{}", "b".repeat(255));
        let violations = validate_create(&req);
        assert_eq!(violations[0].field, "name");
    }

    #[test]
    fn test_description_too_long_rejected() {
        let mut req = valid_request();
        req.description = "d".repeat(1001);
        let violations = validate_create(&req);
        assert_eq!(violations[0].field, "description");
    }

    #[test]
    fn test_label_limits() {
        let mut req = valid_request();
        for i in 0..51 {
            req.labels.insert(format!("k{i}"), "v".to_string());
        }
        let violations = validate_create(&req);
        assert!(violations.iter().any(|v| v.field == "labels"));

        let mut req = valid_request();
        req.labels.insert("k".repeat(64), "v".to_string());
        assert!(!validate_create(&req).is_empty());

        let mut req = valid_request();
        req.labels.insert("k".to_string(), "v".repeat(256));
        assert!(!validate_create(&req).is_empty());
    }

    #[test]
    fn test_cpu_range() {
        for cores in [0u32, 257] {
            let mut req = valid_request();
            req.spec.cpu.cores = cores;
            let violations = validate_create(&req);
            assert!(violations.iter().any(|v| v.field.contains("cpu.cores")));
        }
    }

    #[test]
    fn test_memory_range() {
        for size in [0u64, 255, 1_048_577] {
            let mut req = valid_request();
            req.spec.memory.size_mib = size;
            let violations = validate_create(&req);
            assert!(violations.iter().any(|v| v.field.contains("memory.size_mib")));
        }
    }

    #[test]
    fn test_disk_range() {
        for size in [0u64, 65_537] {
            let mut req = valid_request();
            req.spec.disks[0].size_gib = size;
            let violations = validate_create(&req);
            assert!(violations.iter().any(|v| v.field.contains("disks[0].size_gib")));
        }
    }

    #[test]
    fn test_update_requires_id() {
        let req = UpdateVmRequest::default();
        let violations = validate_update(&req);
        assert_eq!(violations[0].field, "vm_id");
    }

    #[test]
    fn test_update_partial_spec_checks() {
        let req = UpdateVmRequest {
            vm_id: "vm-1".to_string(),
            cpu: Some(CpuSpec {
                cores: 0,
                ..Default::default()
            }),
            ..Default::default()
        };
        let violations = validate_update(&req);
        assert!(violations.iter().any(|v| v.field == "cpu.cores"));
    }

    #[test]
    fn test_into_error_surfaces_field() {
        let err = into_error(vec![FieldViolation::new("name", "must not be empty")]).unwrap_err();
        assert!(err.to_string().contains("name"));
    }
}
