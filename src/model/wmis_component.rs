use crate::model::common::{identity_eq, merge_field, Entity, Id};
use crate::model::instance::{Instance, InstanceRef};
use serde::{Deserialize, Serialize, Serializer};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WmisComponent {
    pub id: Option<Id>,
    pub component_name: Option<String>,
    pub description: Option<String>,
    pub instance: Option<InstanceRef>,
}

identity_eq!(WmisComponent);

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DetachedComponent<'a> {
    id: Option<Id>,
    component_name: Option<&'a str>,
    description: Option<&'a str>,
}

pub(crate) fn serialize_components<S: Serializer>(
    components: &[WmisComponent],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(components.iter().map(|component| DetachedComponent {
        id: component.id,
        component_name: component.component_name.as_deref(),
        description: component.description.as_deref(),
    }))
}

impl WmisComponent {
    pub fn new(component_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            component_name: Some(component_name.into()),
            description: Some(description.into()),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: Id) -> Self {
        self.id = Some(id);
        self
    }

    /// Child-side assignment only; see `Instance::add_component`.
    pub fn set_instance(&mut self, instance: Option<&Instance>) {
        self.instance = instance.map(Instance::to_ref);
    }
}

impl Entity for WmisComponent {
    const ENTITY_NAME: &'static str = "wMISComponent";
    const RESOURCE: &'static str = "wmis-components";
    const INDEX_NAME: &'static str = "wmiscomponent";

    fn id(&self) -> Option<Id> {
        self.id
    }

    fn set_id(&mut self, id: Option<Id>) {
        self.id = id;
    }

    fn merge_from(&mut self, patch: &Self) {
        merge_field(&mut self.component_name, &patch.component_name);
        merge_field(&mut self.description, &patch.description);
    }
}
