use crate::model::application::{Application, ApplicationRef};
use crate::model::common::{identity_eq, merge_field, Entity, Id};
use crate::model::wmis_component::{serialize_components, WmisComponent};
use serde::{Deserialize, Serialize, Serializer};

/// A country-level deployment of an application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "InstanceBody")]
pub struct Instance {
    pub id: Option<Id>,
    pub country_name: Option<String>,
    /// Inverse side of `WmisComponent::instance`.
    #[serde(
        rename = "instances",
        skip_serializing_if = "Vec::is_empty",
        serialize_with = "serialize_components"
    )]
    components: Vec<WmisComponent>,
    pub application: Option<ApplicationRef>,
}

identity_eq!(Instance);

/// Projection of an instance carried by its components.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRef {
    pub id: Option<Id>,
    pub country_name: Option<String>,
}

identity_eq!(InstanceRef);

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstanceBody {
    id: Option<Id>,
    country_name: Option<String>,
    #[serde(default, rename = "instances")]
    components: Option<Vec<WmisComponent>>,
    application: Option<ApplicationRef>,
}

impl From<InstanceBody> for Instance {
    fn from(body: InstanceBody) -> Self {
        let mut instance = Instance {
            id: body.id,
            country_name: body.country_name,
            components: Vec::new(),
            application: body.application,
        };
        instance.set_components(body.components.unwrap_or_default());
        instance
    }
}

/// Serializes a parent's instance collection without each member's own
/// associations, so the graph is emitted one level deep.
pub(crate) fn serialize_instances<S: Serializer>(
    instances: &[Instance],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(instances.iter().map(Instance::to_ref))
}

impl Instance {
    pub fn new(country_name: impl Into<String>) -> Self {
        Self {
            country_name: Some(country_name.into()),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: Id) -> Self {
        self.id = Some(id);
        self
    }

    pub fn to_ref(&self) -> InstanceRef {
        InstanceRef {
            id: self.id,
            country_name: self.country_name.clone(),
        }
    }

    /// Point the back-reference at `application` without touching the
    /// application's own collection. Use `Application::add_instance` to keep
    /// both sides in step.
    pub fn set_application(&mut self, application: Option<&Application>) {
        self.application = application.map(Application::to_ref);
    }

    pub fn components(&self) -> &[WmisComponent] {
        &self.components
    }

    /// Attach `component`, pointing its back-reference at this instance.
    pub fn add_component(&mut self, mut component: WmisComponent) -> &mut Self {
        component.instance = Some(self.to_ref());
        match self.components.iter().position(|existing| *existing == component) {
            Some(pos) => self.components[pos] = component,
            None => self.components.push(component),
        }
        self
    }

    pub fn remove_component(&mut self, component: &WmisComponent) -> Option<WmisComponent> {
        let pos = self.components.iter().position(|existing| existing == component)?;
        let mut removed = self.components.remove(pos);
        removed.instance = None;
        Some(removed)
    }

    /// Replace the whole collection, returning the detached previous members.
    pub fn set_components(&mut self, components: Vec<WmisComponent>) -> Vec<WmisComponent> {
        let mut previous = std::mem::take(&mut self.components);
        for component in &mut previous {
            component.instance = None;
        }
        for component in components {
            self.add_component(component);
        }
        previous
    }
}

impl Entity for Instance {
    const ENTITY_NAME: &'static str = "instance";
    const RESOURCE: &'static str = "instances";
    const INDEX_NAME: &'static str = "instance";

    fn id(&self) -> Option<Id> {
        self.id
    }

    fn set_id(&mut self, id: Option<Id>) {
        self.id = id;
    }

    fn merge_from(&mut self, patch: &Self) {
        merge_field(&mut self.country_name, &patch.country_name);
    }
}
