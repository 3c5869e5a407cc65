use anyhow::Result;
use axum::http::StatusCode;
use serde_json::{json, Value};

mod common;

use taskgram::models::event::NewEvent;
use taskgram::store::EventStore;

use common::{spawn_app, TestApp};

const ADMIN: i64 = 1;
const BOB: i64 = 2;
const CAROL: i64 = 3;

/// Admin, a plain developer `bob` and a developer `carol`, plus an admin token.
async fn seeded() -> Result<(TestApp, String)> {
    let app = spawn_app().await?;
    app.seed_user(ADMIN, "root", "Главный Админ", "Админ").await?;
    app.seed_user(BOB, "bob", "Боб Строитель", "Разработчик").await?;
    app.seed_user(CAROL, "carol", "Кэрол Тестер", "Разработчик").await?;
    let admin = app.token_for(ADMIN, "Админ")?;
    Ok((app, admin))
}

async fn create_project(app: &TestApp, token: &str, members: Value) -> Result<i64> {
    let (status, body) = app
        .send(
            "POST",
            "/projects",
            Some(token),
            Some(json!({ "title": "Запуск", "description": "", "members": members })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "create project failed: {}", body);
    Ok(body["id"].as_i64().expect("project id"))
}

#[tokio::test]
async fn member_promoted_to_leader_can_create_tasks() -> Result<()> {
    let (app, admin) = seeded().await?;
    let project_id = create_project(&app, &admin, json!([{ "username": "@bob", "role": "исполнитель" }])).await?;
    let bob = app.token_for(BOB, "Разработчик")?;

    let task = json!({ "id_project": project_id, "title": "Сверстать лендинг", "user": "carol" });
    let (status, _) = app.send("POST", "/tasks", Some(&bob), Some(task.clone())).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, project) = app
        .send(
            "PUT",
            &format!("/projects/{project_id}/members/bob"),
            Some(&admin),
            Some(json!({ "role": "руководитель" })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "promote failed: {}", project);
    assert_eq!(project["members"][0]["role"], "руководитель, Модератор");
    assert_eq!(project["members"][0]["username"], "bob");

    let (status, created) = app.send("POST", "/tasks", Some(&bob), Some(task)).await?;
    assert_eq!(status, StatusCode::CREATED, "create failed: {}", created);
    assert_eq!(created["status"], "new");
    assert_eq!(created["assignee"], "carol");
    assert_eq!(created["assignee_id"], CAROL);
    assert_eq!(created["author"], "Боб Строитель");
    assert_eq!(created["author_id"], BOB);

    assert_eq!(app.sent_to(), vec![CAROL]);
    Ok(())
}

#[tokio::test]
async fn task_lifecycle_over_http() -> Result<()> {
    let (app, admin) = seeded().await?;
    let project_id = create_project(&app, &admin, json!([{ "username": "bob", "role": "Разработчик" }])).await?;
    let bob = app.token_for(BOB, "Разработчик")?;

    let (status, task) = app
        .send(
            "POST",
            "/tasks",
            Some(&admin),
            Some(json!({ "id_project": project_id, "title": "Отчёт", "deadline": "2025-10-01", "user": "bob" })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    let task_id = task["id"].as_i64().expect("task id");
    assert_eq!(task["author_id"], ADMIN);

    let (status, _) = app
        .send("POST", &format!("/tasks/{task_id}/review"), Some(&admin), Some(json!({ "approved": true })))
        .await?;
    assert_eq!(status, StatusCode::CONFLICT, "review of a new task must conflict");

    let (status, task) = app
        .send("POST", &format!("/tasks/{task_id}/complete"), Some(&bob), Some(json!({ "message": "готово" })))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(task["status"], "submitted");
    assert_eq!(task["completion_message"], "готово");

    // a developer cannot review
    let (status, _) = app
        .send("POST", &format!("/tasks/{task_id}/review"), Some(&bob), Some(json!({ "approved": true })))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, task) = app
        .send(
            "POST",
            &format!("/tasks/{task_id}/review"),
            Some(&admin),
            Some(json!({ "approved": false, "message": "переделать" })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(task["status"], "rejected");
    assert_eq!(task["review_message"], "переделать");
    assert_eq!(task["reviewed_by"], "Главный Админ");

    let (status, task) = app
        .send("POST", &format!("/tasks/{task_id}/complete"), Some(&bob), Some(json!({ "message": "исправил" })))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(task["status"], "submitted");

    let (status, task) = app
        .send("POST", &format!("/tasks/{task_id}/review"), Some(&admin), Some(json!({ "approved": true })))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(task["status"], "approved");

    let (_, project) = app.send("GET", &format!("/projects/{project_id}"), Some(&admin), None).await?;
    assert_eq!(project["status"], "completed");

    // created, submitted, rejected, resubmitted, approved
    assert_eq!(app.sent_to(), vec![BOB, ADMIN, BOB, ADMIN, BOB]);
    Ok(())
}

#[tokio::test]
async fn task_crud_and_listing() -> Result<()> {
    let (app, admin) = seeded().await?;
    let first = create_project(&app, &admin, json!([])).await?;
    let second = create_project(&app, &admin, json!([])).await?;

    let (status, task) = app
        .send("POST", "/tasks", Some(&admin), Some(json!({ "id_project": first, "title": "Черновик" })))
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    let task_id = task["id"].as_i64().expect("task id");
    assert!(task["assignee_id"].is_null());

    let (status, _) = app
        .send("POST", "/tasks", Some(&admin), Some(json!({ "id_project": first, "title": "   " })))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, task) = app
        .send(
            "PUT",
            &format!("/tasks/{task_id}"),
            Some(&admin),
            Some(json!({ "id_project": second, "title": "Чистовик", "user": "@carol" })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "update failed: {}", task);
    assert_eq!(task["project_id"], second);
    assert_eq!(task["title"], "Чистовик");
    assert_eq!(task["assignee_id"], CAROL);

    let task_uri = format!("/tasks/{task_id}");
    let (_, task) = app.send("PUT", &task_uri, Some(&admin), Some(json!({ "deadline": "2025-10-01" }))).await?;
    assert_eq!(task["deadline"], "2025-10-01");
    let (_, task) = app.send("PUT", &task_uri, Some(&admin), Some(json!({ "title": "Чистовик 2" }))).await?;
    assert_eq!(task["deadline"], "2025-10-01", "absent deadline must be kept");
    let (status, task) = app.send("PUT", &task_uri, Some(&admin), Some(json!({ "deadline": null }))).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(task["deadline"].is_null(), "null must clear the deadline: {}", task);

    let (_, listed) = app.send("GET", &format!("/tasks?id_project={second}"), Some(&admin), None).await?;
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
    let (_, listed) = app.send("GET", &format!("/tasks?id_project={first}"), Some(&admin), None).await?;
    assert_eq!(listed.as_array().map(Vec::len), Some(0));

    let (status, _) = app.send("DELETE", &format!("/tasks/{task_id}"), Some(&admin), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.send("GET", &format!("/tasks/{task_id}"), Some(&admin), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn membership_administration() -> Result<()> {
    let (app, admin) = seeded().await?;
    let project_id = create_project(&app, &admin, json!([])).await?;
    let members_uri = format!("/projects/{project_id}/members");

    let (status, project) = app
        .send("POST", &members_uri, Some(&admin), Some(json!({ "username": "@Carol", "role": "Разработчик" })))
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(project["members"][0]["username"], "Carol");
    assert_eq!(project["members"][0]["full_name"], "Кэрол Тестер");
    assert_eq!(project["members"][0]["telegram_id"], CAROL);

    let (status, _) = app
        .send("POST", &members_uri, Some(&admin), Some(json!({ "username": "carol", "role": "Разработчик" })))
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .send("POST", &members_uri, Some(&admin), Some(json!({ "username": "bob", "role": "Разработчик, Админ" })))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let bob = app.token_for(BOB, "Разработчик")?;
    let (status, _) = app
        .send("POST", &members_uri, Some(&bob), Some(json!({ "username": "bob", "role": "Разработчик" })))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.send("DELETE", &format!("{members_uri}/nobody"), Some(&admin), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, project) = app.send("DELETE", &format!("{members_uri}/carol"), Some(&admin), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(project["members"].as_array().map(Vec::len), Some(0));

    let (status, _) = app
        .send(
            "POST",
            "/projects",
            Some(&admin),
            Some(json!({ "title": "Дубли", "members": [{ "username": "bob" }, { "username": "@BOB" }] })),
        )
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    Ok(())
}

#[tokio::test]
async fn project_status_requires_task_management() -> Result<()> {
    let (app, admin) = seeded().await?;
    let project_id = create_project(&app, &admin, json!([{ "username": "bob", "role": "Руководитель" }])).await?;
    let uri = format!("/projects/{project_id}/status");

    let carol = app.token_for(CAROL, "Разработчик")?;
    let (status, _) = app.send("PUT", &uri, Some(&carol), Some(json!({ "status": "on_hold" }))).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let bob = app.token_for(BOB, "Разработчик")?;
    let (status, project) = app.send("PUT", &uri, Some(&bob), Some(json!({ "status": "on_hold" }))).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(project["status"], "on_hold");

    let (status, _) = app.send("PUT", &uri, Some(&bob), Some(json!({ "status": " " }))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, listed) = app.send("GET", "/projects?username=@BOB", Some(&carol), None).await?;
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
    let (_, listed) = app.send("GET", "/projects?username=carol", Some(&carol), None).await?;
    assert_eq!(listed.as_array().map(Vec::len), Some(0));

    Ok(())
}

#[tokio::test]
async fn dashboard_lists_member_projects_and_open_tasks() -> Result<()> {
    let (app, admin) = seeded().await?;
    let mine = create_project(&app, &admin, json!([{ "username": "bob", "role": "Разработчик" }])).await?;
    let other = create_project(&app, &admin, json!([])).await?;

    for (project_id, title) in [(mine, "Открытая"), (other, "Чужой проект"), (mine, "Закрытая")] {
        let (status, _) = app
            .send("POST", "/tasks", Some(&admin), Some(json!({ "id_project": project_id, "title": title, "user": "bob" })))
            .await?;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, tasks) = app.send("GET", &format!("/tasks?id_project={mine}"), Some(&admin), None).await?;
    let closed = tasks
        .as_array()
        .and_then(|tasks| tasks.iter().find(|task| task["title"] == "Закрытая"))
        .and_then(|task| task["id"].as_i64())
        .expect("closed task");
    let bob = app.token_for(BOB, "Разработчик")?;
    app.send("POST", &format!("/tasks/{closed}/complete"), Some(&bob), Some(json!({ "message": "" })))
        .await?;
    app.send("POST", &format!("/tasks/{closed}/review"), Some(&admin), Some(json!({ "approved": true })))
        .await?;

    let (status, dashboard) = app.send("GET", "/dashboard", Some(&bob), None).await?;
    assert_eq!(status, StatusCode::OK, "dashboard failed: {}", dashboard);
    assert_eq!(dashboard["projects"].as_array().map(Vec::len), Some(1));
    assert_eq!(dashboard["projects"][0]["id"], mine);

    let titles: Vec<&str> = dashboard["tasks"]
        .as_array()
        .map(|tasks| tasks.iter().filter_map(|task| task["title"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(titles.len(), 2);
    assert!(titles.contains(&"Открытая"));
    assert!(titles.contains(&"Чужой проект"));
    assert!(dashboard["tasks"][0]["project_title"].is_string());

    let (status, by_name) = app.send("GET", "/dashboard?username=@bob", Some(&admin), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_name["tasks"], dashboard["tasks"]);

    assert_eq!(dashboard["events"], json!([]));

    let (status, _) = app.send("GET", "/dashboard", Some(&app.token_for(99, "")?), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn user_directory_search_and_update() -> Result<()> {
    let (app, admin) = seeded().await?;
    let bob = app.token_for(BOB, "Разработчик")?;

    let (status, found) = app.send("GET", "/users/search?term=%D0%B1%D0%BE%D0%B1", Some(&bob), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found.as_array().map(Vec::len), Some(1));
    assert_eq!(found[0]["username"], "bob");

    let (status, _) = app.send("GET", "/users/search?term=", Some(&bob), None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, all) = app.send("GET", "/users", Some(&bob), None).await?;
    assert_eq!(all.as_array().map(Vec::len), Some(3));

    let update = json!({ "full_name": "Боб Мастер", "username": "@bobby", "role": "Руководитель" });
    let (status, _) = app.send("PUT", &format!("/users/{BOB}"), Some(&bob), Some(update.clone())).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, user) = app.send("PUT", &format!("/users/{BOB}"), Some(&admin), Some(update)).await?;
    assert_eq!(status, StatusCode::OK, "update failed: {}", user);
    assert_eq!(user["username"], "bobby");
    assert_eq!(user["full_name"], "Боб Мастер");
    assert_eq!(user["role"], "Руководитель");

    let (status, _) = app
        .send("PUT", &format!("/users/{BOB}"), Some(&admin), Some(json!({ "role": "admin, developer" })))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send("PUT", "/users/404", Some(&admin), Some(json!({ "full_name": "x" })))
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn event_feed_is_newest_first_and_on_dashboard() -> Result<()> {
    let (app, _) = seeded().await?;
    let bob = app.token_for(BOB, "Разработчик")?;

    let (status, _) = app.send("GET", "/events", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    app.store
        .create_event(&NewEvent {
            title: "Планёрка".to_string(),
            date: "01.10.2025".to_string(),
            time_range: "10:00-11:00".to_string(),
            created_by: "root".to_string(),
            description: "Еженедельная".to_string(),
        })
        .await?;
    app.store
        .create_event(&NewEvent {
            title: "Демо".to_string(),
            date: "03.10.2025".to_string(),
            created_by: "root".to_string(),
            ..Default::default()
        })
        .await?;

    let (status, events) = app.send("GET", "/events", Some(&bob), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(events.as_array().map(Vec::len), Some(2));
    assert_eq!(events[0]["title"], "Демо");
    assert!(events[0].get("description").is_none(), "empty description is omitted");
    assert_eq!(events[1]["title"], "Планёрка");
    assert_eq!(events[1]["time_range"], "10:00-11:00");
    assert_eq!(events[1]["description"], "Еженедельная");

    let (status, dashboard) = app.send("GET", "/dashboard", Some(&bob), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dashboard["events"], events);

    Ok(())
}
