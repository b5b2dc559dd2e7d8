//! Action messages sent in the `message` parameter

use serde_json::{json, Value};

/// Host configuration controller action listing every accessible object
pub const DISCOVERY_DESCRIPTOR: &str =
    "serviceComponent://ui.force.components.controllers.hostConfig.HostConfigController/ACTION$getConfigData";

/// List data provider action returning the records of one object
pub const LIST_ITEMS_DESCRIPTOR: &str = "serviceComponent://ui.force.components.controllers.lists.selectableListDataProvider.SelectableListDataProviderController/ACTION$getItems";

/// Records requested per object
pub const PAGE_SIZE: u32 = 1000;

const ACTION_ID: &str = "100;a";

fn single_action(descriptor: &str, params: Value) -> String {
    json!({
        "actions": [{
            "id": ACTION_ID,
            "descriptor": descriptor,
            "callingDescriptor": "UNKNOWN",
            "params": params,
        }]
    })
    .to_string()
}

/// Message asking for the object-name to key-prefix map
pub fn discovery_message() -> String {
    single_action(DISCOVERY_DESCRIPTOR, json!({}))
}

/// Message asking for the first page of records of `object_name`
pub fn object_items_message(object_name: &str) -> String {
    single_action(
        LIST_ITEMS_DESCRIPTOR,
        json!({
            "entityNameOrId": object_name,
            "layoutType": "FULL",
            "pageSize": PAGE_SIZE,
            "currentPage": 0,
            "useTimeout": false,
            "getCount": false,
            "enableRowActions": false,
        }),
    )
}
