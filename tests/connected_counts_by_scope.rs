mod test_support;

use serde_json::json;
use std::io::BufReader;
use std::process::{ChildStdin, ChildStdout};
use test_support::{
    open_workspace_db, request, request_err_code, request_ok, seed_hierarchy, select_workspace,
    spawn_sidecar, temp_dir,
};

fn count(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    params: serde_json::Value,
) -> u64 {
    let out = request_ok(stdin, reader, "n", "connected.count", params);
    out["count"].as_u64().expect("count")
}

fn populate(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>) {
    seed_hierarchy(stdin, reader);
    // (user, course, role, sex)
    let enrolled = [
        (1, 42, "teacher", "female"),
        (2, 42, "student", "female"),
        (3, 42, "student", "male"),
        (4, 43, "nonEditingTeacher", "male"),
        (5, 99, "student", "male"),
    ];
    for (user, course, role, sex) in enrolled {
        let _ = request_ok(
            stdin,
            reader,
            "u",
            "users.upsert",
            json!({ "userId": user, "sex": sex }),
        );
        let _ = request_ok(
            stdin,
            reader,
            "e",
            "enrolments.set",
            json!({ "courseId": course, "userId": user, "role": role }),
        );
        let _ = request_ok(
            stdin,
            reader,
            "t",
            "connected.touch",
            json!({ "userId": user, "role": role, "courseId": course }),
        );
    }
    let _ = request_ok(stdin, reader, "g", "connected.touch", json!({ "userId": 6, "role": "guest" }));
    let _ = request_ok(stdin, reader, "a", "admins.set", json!({ "userId": 1, "isAdmin": true }));
}

#[test]
fn counts_narrow_with_the_scope_and_sum_across_roles() {
    let workspace = temp_dir("swadd-counts-scope");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);
    populate(&mut stdin, &mut reader);

    let c42 = json!({ "level": "course", "nodeId": 42, "role": "student" });
    assert_eq!(count(&mut stdin, &mut reader, c42), 2);
    let deg = json!({ "level": "degree", "nodeId": 1000, "role": "unknown" });
    assert_eq!(count(&mut stdin, &mut reader, deg), 4);
    let cty2 = json!({ "level": "country", "nodeId": 2, "role": "unknown" });
    assert_eq!(count(&mut stdin, &mut reader, cty2), 1);
    let sys = json!({ "role": "student" });
    assert_eq!(count(&mut stdin, &mut reader, sys), 3);
    let guests = json!({ "level": "course", "nodeId": 99, "role": "guest" });
    assert_eq!(count(&mut stdin, &mut reader, guests), 1);

    let teacher = request_ok(
        &mut stdin,
        &mut reader,
        "s",
        "connected.count",
        json!({ "level": "course", "nodeId": 42, "role": "teacher" }),
    );
    assert_eq!(teacher["dominantSex"], "female");
    let mixed = request_ok(
        &mut stdin,
        &mut reader,
        "s2",
        "connected.count",
        json!({ "level": "course", "nodeId": 42, "role": "student" }),
    );
    assert_eq!(mixed["dominantSex"], "unknown");

    // guest 1 + student 3 + non-editing 1 + teacher 1 + admin 1
    let sum = request_ok(&mut stdin, &mut reader, "sum", "connected.sumAllRoles", json!({}));
    assert_eq!(sum["total"], 7);

    let global = request_ok(&mut stdin, &mut reader, "gl", "connected.global", json!({}));
    let per_role = global["perRole"].as_array().expect("perRole");
    let roles: Vec<_> = per_role.iter().map(|r| r["role"].as_str().unwrap_or("")).collect();
    assert_eq!(
        roles,
        vec!["guest", "student", "nonEditingTeacher", "teacher", "sysAdmin"]
    );
    let by_role: u64 = per_role.iter().map(|r| r["count"].as_u64().unwrap_or(0)).sum();
    assert_eq!(global["total"].as_u64(), Some(by_role));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn malformed_scopes_and_roles_are_rejected() {
    let workspace = temp_dir("swadd-counts-invalid");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);

    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "1",
        "connected.count",
        json!({ "level": "centre", "role": "student" }),
    );
    assert_eq!(code, "invalid_scope");
    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "2",
        "connected.count",
        json!({ "role": "dean" }),
    );
    assert_eq!(code, "invalid_role");
    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "3",
        "enrolments.set",
        json!({ "courseId": 42, "userId": 1, "role": "guest" }),
    );
    assert_eq!(code, "invalid_role");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn query_failures_abort_without_partial_results() {
    let workspace = temp_dir("swadd-counts-broken");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);
    populate(&mut stdin, &mut reader);

    let side = open_workspace_db(&workspace);
    side.execute("DROP TABLE course_users", [])
        .expect("drop enrolments");
    drop(side);

    let calls = [
        ("connected.count", json!({ "level": "course", "nodeId": 42, "role": "student" })),
        ("connected.sumAllRoles", json!({})),
        ("connected.list", json!({ "level": "course", "nodeId": 42, "viewerRole": "student" })),
    ];
    for (i, (method, params)) in calls.into_iter().enumerate() {
        let value = request(&mut stdin, &mut reader, &format!("q{}", i), method, params);
        assert_eq!(value.get("ok").and_then(|v| v.as_bool()), Some(false), "{}", method);
        assert_eq!(
            value.pointer("/error/code").and_then(|v| v.as_str()),
            Some("db_query_failed"),
            "{}",
            method
        );
        assert!(value.get("result").is_none(), "{} leaked a result", method);
    }

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
