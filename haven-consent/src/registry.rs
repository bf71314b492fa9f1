// ABOUTME: holds the immutable table mapping action ids to their risk tier and warning text.
// ABOUTME: built once at startup; duplicate ids with a different tier abort startup.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::ConsentError;
use crate::language::Bilingual;
use crate::tier::RiskTier;

/// Static metadata for one gated action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionDescriptor {
    pub action_id: String,
    pub tier: RiskTier,
    pub description: Bilingual,
    pub reversible: bool,
}

/// Mutable construction phase of the registry. Only exists during startup;
/// `build` freezes the table.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    actions: BTreeMap<String, ActionDescriptor>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one action. Re-registering the same id with the identical
    /// tier is a no-op; a different tier is a configuration error, so a
    /// catalog merge can never silently downgrade an action's risk.
    pub fn register(
        &mut self,
        action_id: &str,
        tier: RiskTier,
        description: Bilingual,
        reversible: bool,
    ) -> Result<(), ConsentError> {
        let action_id = action_id.trim();
        if action_id.is_empty() {
            return Err(ConsentError::MalformedRequest(
                "empty action id".to_string(),
            ));
        }

        if let Some(existing) = self.actions.get(action_id) {
            if existing.tier == tier {
                return Ok(());
            }
            return Err(ConsentError::DuplicateRegistration {
                action_id: action_id.to_string(),
                existing: existing.tier,
                requested: tier,
            });
        }

        self.actions.insert(
            action_id.to_string(),
            ActionDescriptor {
                action_id: action_id.to_string(),
                tier,
                description,
                reversible,
            },
        );
        Ok(())
    }

    pub fn build(self) -> ActionRegistry {
        ActionRegistry {
            actions: self.actions,
        }
    }
}

/// The frozen action table. Read-only after `build`, so it can be shared
/// across callers without locking.
#[derive(Debug)]
pub struct ActionRegistry {
    actions: BTreeMap<String, ActionDescriptor>,
}

impl ActionRegistry {
    pub fn lookup(&self, action_id: &str) -> Option<&ActionDescriptor> {
        self.actions.get(action_id)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActionDescriptor> {
        self.actions.values()
    }
}

/// The product's built-in action catalog: GitHub, Azure, and local workspace
/// actions, each with a calm bilingual warning that states the consequence
/// and whether it can be undone.
pub fn builtin_catalog() -> Result<RegistryBuilder, ConsentError> {
    let mut builder = RegistryBuilder::new();

    builder.register(
        "github.delete_repo",
        RiskTier::Critical,
        Bilingual::new(
            "سيحذف هذا الإجراء المستودع {repository} بشكل دائم.",
            "This will permanently delete the repository {repository}.",
        ),
        false,
    )?;
    builder.register(
        "github.force_push",
        RiskTier::High,
        Bilingual::new(
            "الدفع القسري إلى {repository} قد يحذف تاريخ الكود.",
            "Force pushing to {repository} may delete code history.",
        ),
        false,
    )?;
    builder.register(
        "github.make_public",
        RiskTier::Medium,
        Bilingual::new(
            "سيصبح المستودع {repository} مرئياً للجميع.",
            "The repository {repository} will become visible to everyone.",
        ),
        true,
    )?;

    builder.register(
        "azure.delete_resource",
        RiskTier::High,
        Bilingual::new(
            "سيتم حذف {resource} من Azure، وقد يؤثر ذلك على الخدمات المرتبطة.",
            "The resource {resource} will be deleted from Azure, which may affect connected services.",
        ),
        false,
    )?;
    builder.register(
        "azure.modify_permissions",
        RiskTier::Medium,
        Bilingual::new(
            "سيتم تعديل صلاحيات الوصول إلى {resource}.",
            "Access permissions for {resource} will be modified.",
        ),
        true,
    )?;

    builder.register(
        "file.delete",
        RiskTier::Low,
        Bilingual::new(
            "سيتم حذف الملف {path}.",
            "The file {path} will be deleted.",
        ),
        false,
    )?;
    builder.register(
        "history.clear",
        RiskTier::Low,
        Bilingual::new(
            "سيتم حذف سجل المحادثات.",
            "The conversation history will be cleared.",
        ),
        false,
    )?;

    builder.register(
        "notes.create",
        RiskTier::Safe,
        Bilingual::new("سيتم إنشاء ملاحظة جديدة.", "A new note will be created."),
        true,
    )?;
    builder.register(
        "notes.delete",
        RiskTier::Low,
        Bilingual::new(
            "سيتم حذف الملاحظة {note}.",
            "The note {note} will be deleted.",
        ),
        false,
    )?;
    builder.register(
        "tasks.delete",
        RiskTier::Low,
        Bilingual::new(
            "سيتم حذف المهمة {task}.",
            "The task {task} will be deleted.",
        ),
        false,
    )?;
    builder.register(
        "tasks.clear_completed",
        RiskTier::Low,
        Bilingual::new(
            "سيتم حذف كل المهام المكتملة.",
            "All completed tasks will be deleted.",
        ),
        false,
    )?;

    Ok(builder)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc() -> Bilingual {
        Bilingual::new("وصف", "description")
    }

    #[test]
    fn lookup_returns_registered_descriptor() {
        let mut builder = RegistryBuilder::new();
        builder
            .register("github.delete_repo", RiskTier::Critical, desc(), false)
            .unwrap();
        let registry = builder.build();

        let found = registry.lookup("github.delete_repo").unwrap();
        assert_eq!(found.tier, RiskTier::Critical);
        assert!(!found.reversible);
        assert!(registry.lookup("github.create_repo").is_none());
    }

    #[test]
    fn identical_re_registration_is_a_noop() {
        let mut builder = RegistryBuilder::new();
        builder
            .register("notes.delete", RiskTier::Low, desc(), false)
            .unwrap();
        builder
            .register("notes.delete", RiskTier::Low, desc(), false)
            .unwrap();
        assert_eq!(builder.build().len(), 1);
    }

    #[test]
    fn different_tier_re_registration_fails_loudly() {
        let mut builder = RegistryBuilder::new();
        builder
            .register("azure.delete_resource", RiskTier::High, desc(), false)
            .unwrap();
        let err = builder
            .register("azure.delete_resource", RiskTier::Low, desc(), false)
            .unwrap_err();
        assert_eq!(
            err,
            ConsentError::DuplicateRegistration {
                action_id: "azure.delete_resource".to_string(),
                existing: RiskTier::High,
                requested: RiskTier::Low,
            }
        );
    }

    #[test]
    fn empty_action_id_is_rejected() {
        let mut builder = RegistryBuilder::new();
        let err = builder
            .register("  ", RiskTier::Low, desc(), true)
            .unwrap_err();
        assert!(matches!(err, ConsentError::MalformedRequest(_)));
    }

    #[test]
    fn builtin_catalog_builds_without_conflicts() {
        let registry = builtin_catalog().unwrap().build();
        assert_eq!(
            registry.lookup("github.delete_repo").unwrap().tier,
            RiskTier::Critical
        );
        assert_eq!(
            registry.lookup("notes.create").unwrap().tier,
            RiskTier::Safe
        );
        assert!(registry.len() >= 10);
    }
}
