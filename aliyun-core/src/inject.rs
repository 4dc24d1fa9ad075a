//! 在请求参数中注入资源组以及过滤系统标签

use crate::Params;
use std::collections::{BTreeMap, HashMap, HashSet};

/// `aliyun`和`acs:`开头的标签是系统标签，只读
pub fn is_system_tag_key(key: &str) -> bool {
    key.starts_with("aliyun") || key.starts_with("acs:")
}

/// 过滤掉系统标签
pub fn filter_system_tags(tags: &HashMap<String, String>) -> BTreeMap<String, String> {
    tags.iter()
        .filter(|(k, _)| !is_system_tag_key(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// 配置的资源组中第一个真实存在的资源组会作为`ResourceGroupId`，已经设置过的不会覆盖
///
/// 返回是否注入了资源组
pub fn inject_resource_group(
    params: &mut Params,
    filter: &[String],
    discovered: &HashSet<String>,
) -> bool {
    if filter.is_empty() || params.contains_key("ResourceGroupId") {
        return false;
    }
    match filter.iter().find(|id| discovered.contains(id.as_str())) {
        Some(id) => {
            params.insert("ResourceGroupId".to_owned(), id.clone());
            true
        }
        None => false,
    }
}

/// 把标签展开为`Tag.N.Key`/`Tag.N.Value`
pub fn append_tag_params<'a>(
    params: &mut Params,
    tags: impl IntoIterator<Item = (&'a String, &'a String)>,
) {
    for (i, (k, v)) in tags.into_iter().enumerate() {
        params.insert(format!("Tag.{}.Key", i + 1), k.clone());
        params.insert(format!("Tag.{}.Value", i + 1), v.clone());
    }
}

/// 把要删除的标签key展开为`TagKey.N`，系统标签会被过滤掉
pub fn append_tag_key_params<'a>(params: &mut Params, keys: impl IntoIterator<Item = &'a String>) {
    let keys = keys.into_iter().filter(|k| !is_system_tag_key(k));
    for (i, k) in keys.enumerate() {
        params.insert(format!("TagKey.{}", i + 1), k.clone());
    }
}
