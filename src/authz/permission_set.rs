use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Permission;

/// Total mapping of every [`Permission`] to a boolean.
///
/// Backed by a fixed array so a partial set cannot exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionSet([bool; Permission::COUNT]);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PermissionSetError {
    #[error("missing permission keys: {}", .0.join(", "))]
    Missing(Vec<String>),
    #[error("unknown permission keys: {}", .0.join(", "))]
    Unknown(Vec<String>),
    #[error("permission {0} must be a boolean")]
    NotBoolean(String),
}

impl PermissionSet {
    pub fn all(value: bool) -> Self {
        Self([value; Permission::COUNT])
    }

    pub fn get(&self, permission: Permission) -> bool {
        self.0[permission.index()]
    }

    pub fn set(&mut self, permission: Permission, value: bool) {
        self.0[permission.index()] = value;
    }

    pub fn with(mut self, permission: Permission, value: bool) -> Self {
        self.set(permission, value);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (Permission, bool)> + '_ {
        Permission::ALL.iter().map(move |p| (*p, self.get(*p)))
    }

    pub fn granted(&self) -> Vec<Permission> {
        self.iter().filter(|(_, v)| *v).map(|(p, _)| p).collect()
    }

    /// Overlays a stored (possibly partial) override field by field.
    ///
    /// Unknown keys and non-boolean values are skipped.
    pub fn overlay(mut self, overrides: &Map<String, Value>) -> Self {
        for (key, value) in overrides {
            let Some(permission) = Permission::from_key(key) else {
                tracing::warn!(key = %key, "ignoring unknown permission key in stored override");
                continue;
            };
            match value.as_bool() {
                Some(flag) => self.set(permission, flag),
                None => tracing::warn!(key = %key, "ignoring non-boolean value in stored override"),
            }
        }
        self
    }

    /// Parses a proposal that must name every canonical key exactly.
    pub fn from_full_map(map: &Map<String, Value>) -> Result<Self, PermissionSetError> {
        let unknown: Vec<String> = map
            .keys()
            .filter(|k| Permission::from_key(k).is_none())
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(PermissionSetError::Unknown(unknown));
        }

        let missing: Vec<String> = Permission::ALL
            .iter()
            .filter(|p| !map.contains_key(p.key()))
            .map(|p| p.key().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(PermissionSetError::Missing(missing));
        }

        let mut set = Self::all(false);
        for permission in Permission::ALL {
            let flag = map
                .get(permission.key())
                .and_then(Value::as_bool)
                .ok_or_else(|| PermissionSetError::NotBoolean(permission.key().to_string()))?;
            set.set(permission, flag);
        }
        Ok(set)
    }

    pub fn to_json_map(&self) -> Map<String, Value> {
        self.iter()
            .map(|(p, v)| (p.key().to_string(), Value::Bool(v)))
            .collect()
    }
}

impl Serialize for PermissionSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Permission::COUNT))?;
        for (permission, value) in self.iter() {
            map.serialize_entry(permission.key(), &value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PermissionSet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = Map::<String, Value>::deserialize(deserializer)?;
        PermissionSet::from_full_map(&map).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn overlay_is_field_level() {
        let base = PermissionSet::all(true);
        let merged = base.overlay(&as_map(json!({ "canAccessNFTs": false })));

        assert!(!merged.get(Permission::AccessNfts));
        assert!(merged.get(Permission::AccessNftsAdd));
        assert_eq!(merged.granted().len(), Permission::COUNT - 1);
    }

    #[test]
    fn overlay_skips_garbage() {
        let merged = PermissionSet::all(false).overlay(&as_map(json!({
            "canFly": true,
            "canManageUsers": "yes",
            "canAccessJobs": true
        })));

        assert!(merged.get(Permission::AccessJobs));
        assert!(!merged.get(Permission::ManageUsers));
    }

    #[test]
    fn full_map_rejects_partial_sets() {
        let err = PermissionSet::from_full_map(&as_map(json!({ "canAccessDashboard": true })))
            .unwrap_err();
        match err {
            PermissionSetError::Missing(keys) => {
                assert_eq!(keys.len(), Permission::COUNT - 1);
                assert!(keys.contains(&"canManageUsers".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn full_map_rejects_unknown_and_non_boolean() {
        let mut map = PermissionSet::all(true).to_json_map();
        map.insert("canLaunchRockets".into(), json!(true));
        assert!(matches!(
            PermissionSet::from_full_map(&map),
            Err(PermissionSetError::Unknown(_))
        ));

        let mut map = PermissionSet::all(true).to_json_map();
        map.insert("canManageUsers".into(), json!(1));
        assert_eq!(
            PermissionSet::from_full_map(&map),
            Err(PermissionSetError::NotBoolean("canManageUsers".into()))
        );
    }

    #[test]
    fn serializes_every_key() {
        let value = serde_json::to_value(PermissionSet::all(false).with(Permission::ManageUsers, true))
            .unwrap();
        let map = value.as_object().unwrap();
        assert_eq!(map.len(), Permission::COUNT);
        assert_eq!(map["canManageUsers"], json!(true));
        assert_eq!(map["canAccessDashboard"], json!(false));
    }
}
