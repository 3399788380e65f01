use crate::model::common::{identity_eq, merge_field, Entity, Id};
use crate::model::instance::{serialize_instances, Instance};
use serde::{Deserialize, Serialize};

/// An application grouping one or more deployed instances.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "ApplicationBody")]
pub struct Application {
    pub id: Option<Id>,
    pub application_name: Option<String>,
    /// Inverse side of `Instance::application`; never persisted, hidden when empty.
    #[serde(
        rename = "applications",
        skip_serializing_if = "Vec::is_empty",
        serialize_with = "serialize_instances"
    )]
    instances: Vec<Instance>,
}

identity_eq!(Application);

/// Projection of an application carried by its instances.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRef {
    pub id: Option<Id>,
    pub application_name: Option<String>,
}

identity_eq!(ApplicationRef);

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApplicationBody {
    id: Option<Id>,
    application_name: Option<String>,
    #[serde(default, rename = "applications")]
    instances: Option<Vec<Instance>>,
}

impl From<ApplicationBody> for Application {
    fn from(body: ApplicationBody) -> Self {
        let mut application = Application {
            id: body.id,
            application_name: body.application_name,
            instances: Vec::new(),
        };
        application.set_instances(body.instances.unwrap_or_default());
        application
    }
}

impl Application {
    pub fn new(application_name: impl Into<String>) -> Self {
        Self {
            application_name: Some(application_name.into()),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: Id) -> Self {
        self.id = Some(id);
        self
    }

    pub fn to_ref(&self) -> ApplicationRef {
        ApplicationRef {
            id: self.id,
            application_name: self.application_name.clone(),
        }
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    /// Attach `instance`, pointing its back-reference at this application.
    /// A saved instance already present is replaced rather than duplicated.
    pub fn add_instance(&mut self, mut instance: Instance) -> &mut Self {
        instance.application = Some(self.to_ref());
        match self.instances.iter().position(|existing| *existing == instance) {
            Some(pos) => self.instances[pos] = instance,
            None => self.instances.push(instance),
        }
        self
    }

    /// Detach a saved instance; the returned value no longer references this application.
    pub fn remove_instance(&mut self, instance: &Instance) -> Option<Instance> {
        let pos = self.instances.iter().position(|existing| existing == instance)?;
        let mut removed = self.instances.remove(pos);
        removed.application = None;
        Some(removed)
    }

    /// Replace the whole collection. The previous members are returned with
    /// their back-references cleared.
    pub fn set_instances(&mut self, instances: Vec<Instance>) -> Vec<Instance> {
        let mut previous = std::mem::take(&mut self.instances);
        for instance in &mut previous {
            instance.application = None;
        }
        for instance in instances {
            self.add_instance(instance);
        }
        previous
    }
}

impl Entity for Application {
    const ENTITY_NAME: &'static str = "application";
    const RESOURCE: &'static str = "applications";
    const INDEX_NAME: &'static str = "application";

    fn id(&self) -> Option<Id> {
        self.id
    }

    fn set_id(&mut self, id: Option<Id>) {
        self.id = id;
    }

    fn merge_from(&mut self, patch: &Self) {
        merge_field(&mut self.application_name, &patch.application_name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn saved(id: Id) -> Application {
        Application::new("AAAAAAAAAA").with_id(id)
    }

    #[test]
    fn equality_follows_identifier() {
        let application1 = saved(1);
        let mut application2 = saved(1);
        assert_eq!(application1, application2);
        application2.id = Some(2);
        assert_ne!(application1, application2);

        let unsaved = Application::new("AAAAAAAAAA");
        assert_ne!(unsaved, application2);
        assert_ne!(unsaved, unsaved.clone());
    }

    #[test]
    fn adding_instance_sets_back_reference() {
        let mut application = saved(7);
        let instance = Instance::new("Norway").with_id(3);

        application.add_instance(instance.clone());

        assert!(application.instances().contains(&instance));
        let back = application.instances()[0].application.as_ref().unwrap();
        assert_eq!(back.id, Some(7));
        assert_eq!(back.application_name.as_deref(), Some("AAAAAAAAAA"));
    }

    #[test]
    fn adding_same_saved_instance_twice_keeps_one_entry() {
        let mut application = saved(7);
        application.add_instance(Instance::new("Norway").with_id(3));
        application.add_instance(Instance::new("Sweden").with_id(3));

        assert_eq!(application.instances().len(), 1);
        assert_eq!(application.instances()[0].country_name.as_deref(), Some("Sweden"));
    }

    #[test]
    fn removing_instance_clears_back_reference() {
        let mut application = saved(7);
        let instance = Instance::new("Norway").with_id(3);
        application.add_instance(instance.clone());

        let removed = application.remove_instance(&instance).unwrap();

        assert!(removed.application.is_none());
        assert!(application.instances().is_empty());
    }

    #[test]
    fn replacing_collection_detaches_previous_members() {
        let mut application = saved(7);
        application.add_instance(Instance::new("Norway").with_id(3));

        let previous = application.set_instances(vec![Instance::new("Denmark").with_id(4)]);

        assert_eq!(previous.len(), 1);
        assert!(previous[0].application.is_none());
        assert_eq!(application.instances()[0].id, Some(4));
        assert_eq!(
            application.instances()[0].application.as_ref().and_then(|a| a.id),
            Some(7)
        );
    }

    #[test]
    fn merge_keeps_fields_missing_from_patch() {
        let mut existing = saved(1);
        existing.merge_from(&Application {
            id: Some(1),
            ..Application::default()
        });
        assert_eq!(existing.application_name.as_deref(), Some("AAAAAAAAAA"));

        existing.merge_from(&Application::new("BBBBBBBBBB").with_id(1));
        assert_eq!(existing.application_name.as_deref(), Some("BBBBBBBBBB"));
    }

    #[test]
    fn deserialized_collection_points_back_at_parent() {
        let application: Application = serde_json::from_value(json!({
            "id": 5,
            "applicationName": "portal",
            "applications": [{ "id": 9, "countryName": "Norway" }]
        }))
        .unwrap();

        let instance = &application.instances()[0];
        assert_eq!(instance.application.as_ref().and_then(|a| a.id), Some(5));
    }

    #[test]
    fn serialized_collection_hides_inverse_side() {
        let mut application = saved(5);
        application.add_instance(Instance::new("Norway").with_id(9));

        let value = serde_json::to_value(&application).unwrap();

        assert_eq!(value["applicationName"], "AAAAAAAAAA");
        assert_eq!(value["applications"][0]["countryName"], "Norway");
        assert!(value["applications"][0].get("application").is_none());
        assert!(value["applications"][0].get("instances").is_none());
    }

    #[test]
    fn empty_collection_is_omitted() {
        let value = serde_json::to_value(saved(5)).unwrap();
        assert!(value.get("applications").is_none());
        assert_eq!(value["id"], 5);
    }
}
