//! Fixtures shared by the domain and API tests

use std::sync::Arc;

use voice_companion_data::config_tables::{ConfigTables, MemoryWorkbooks, RawSheet};

use crate::services::navigation::NAVIGATION_DOMAIN;
use crate::services::nlp::{NLP_DOMAIN, PAGE_UI_DOMAIN};

fn navigation_sheets() -> Vec<RawSheet> {
    vec![
        RawSheet::from_text(
            "Pages",
            &[
                &["ID", "Name", "Route", "ScreenClass", "Keywords", "Description", "Icon", "Category"],
                &["page id", "display name", "route", "screen", "comma separated", "", "", ""],
                &["string", "string", "string", "string", "string", "string", "string", "string"],
                &["health", "健康数据", "/health", "HealthScreen", "健康,数据", "健康数据总览", "heart", "health"],
                &["settings", "设置", "/settings", "SettingsScreen", "设置,选项", "应用设置", "gear", "system"],
            ],
        ),
        RawSheet::from_text(
            "Actions",
            &[
                &["ID", "Name", "Action", "Keywords", "Description", "Parameters"],
                &["action id", "display name", "action", "comma separated", "", "parameters"],
                &["string", "string", "string", "string", "string", "json"],
                &["refresh", "刷新页面", "refresh", "刷新,重新加载", "刷新当前页面", r#"{"force": true}"#],
            ],
        ),
    ]
}

fn nlp_sheets() -> Vec<RawSheet> {
    vec![
        RawSheet::from_text(
            "Intent",
            &[
                &["ID", "Name", "Description", "Keywords", "Catagory"],
                &["intent id", "name", "description", "comma separated", "chat or navigation"],
                &["int", "string", "string", "string", "string"],
                &["100001", "通用", "日常聊天", "", "chat"],
                &["100002", "问候", "用户打招呼", "你好,hello", "chat"],
                &["100003", "健康咨询", "健康相关问题", "健康,医生", "chat"],
                &["100004", "睡眠", "睡眠问题", "睡眠,失眠,睡不着", "chat"],
                &["100005", "导航", "页面跳转", "打开,跳转", "navigation"],
            ],
        ),
        RawSheet::from_text(
            "Chat",
            &[
                &["ID", "Template"],
                &["intent id", "newline separated replies"],
                &["int", "string"],
                &["100001", "我在听，请继续说。"],
                &["100002", "你好呀！\n很高兴见到你！"],
            ],
        ),
    ]
}

fn page_ui_sheets() -> Vec<RawSheet> {
    vec![
        RawSheet::from_text(
            "pages",
            &[
                &["route", "page_name", "description", "tags", "statistics"],
                &["route", "name", "", "", ""],
                &["string", "string", "string", "string", "string"],
                &["/health", "健康数据", "展示步数与睡眠", "运动,睡眠", "每日汇总"],
            ],
        ),
        RawSheet::from_text(
            "components",
            &[
                &["component_id", "route", "name", "type", "display", "description", "related_fields"],
                &["id", "", "", "", "", "", ""],
                &["string", "string", "string", "string", "string", "string", "string"],
                &["steps_card", "/health", "步数卡片", "card", "", "今日步数", "steps,goal"],
                &["profile_form", "/settings", "资料表单", "form", "", "", ""],
            ],
        ),
        RawSheet::from_text(
            "actions",
            &[
                &["action_id", "route", "name", "type", "trigger", "result", "related"],
                &["id", "", "", "", "", "", ""],
                &["string", "string", "string", "string", "string", "string", "string"],
                &["sync", "/health", "同步数据", "button", "点击", "刷新卡片", ""],
            ],
        ),
    ]
}

/// In-memory workbooks for `navigation`, `nlp` and `page_ui_info`
pub fn sample_workbooks() -> Arc<MemoryWorkbooks> {
    let books = Arc::new(MemoryWorkbooks::new());
    books.insert(NAVIGATION_DOMAIN, navigation_sheets());
    books.insert(NLP_DOMAIN, nlp_sheets());
    books.insert(PAGE_UI_DOMAIN, page_ui_sheets());
    books
}

/// Configuration tables loaded from [`sample_workbooks`]
pub fn sample_config_tables() -> Arc<ConfigTables> {
    let tables = Arc::new(ConfigTables::new(sample_workbooks()));
    tables.reload_all_configs();
    tables
}
