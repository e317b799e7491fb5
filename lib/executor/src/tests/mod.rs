use std::time::Duration;

use sonic_rs::{json, JsonContainerTrait, JsonValueTrait};

use crate::{
    execution::error::ExecutionError,
    executors::error::SubgraphExecutorError,
    operation::value::ValueLiteral,
    plan::NodeId,
    utils::cancellation::CancellationToken,
};

mod fixtures;

use fixtures::{MockSubgraph, TestGateway};

const MOVIES_OPERATION: &str = r#"{
    "rootSelectionSet": 0,
    "selectionSets": [
        {
            "id": 0,
            "typeName": "Query",
            "selections": [
                {"responseName": "movie", "fieldName": "movie", "fieldType": "Movie", "typeKind": "object", "selectionSets": {"Movie": 1}},
                {"responseName": "movie2", "fieldName": "movie", "fieldType": "Movie", "typeKind": "object", "selectionSets": {"Movie": 2}}
            ]
        },
        {
            "id": 1,
            "typeName": "Movie",
            "selections": [
                {"responseName": "id", "fieldName": "id", "fieldType": "ID!", "typeKind": "scalar"},
                {"responseName": "title", "fieldName": "title", "fieldType": "String!", "typeKind": "scalar"},
                {"responseName": "director", "fieldName": "director", "fieldType": "Director", "typeKind": "object", "selectionSets": {"Director": 3}}
            ]
        },
        {
            "id": 2,
            "typeName": "Movie",
            "selections": [
                {"responseName": "id", "fieldName": "id", "fieldType": "ID!", "typeKind": "scalar"},
                {"responseName": "title", "fieldName": "title", "fieldType": "String!", "typeKind": "scalar"},
                {"responseName": "director", "fieldName": "director", "fieldType": "Director", "typeKind": "object", "selectionSets": {"Director": 4}}
            ]
        },
        {
            "id": 3,
            "typeName": "Director",
            "selections": [
                {"responseName": "name", "fieldName": "name", "fieldType": "String!", "typeKind": "scalar"}
            ]
        },
        {
            "id": 4,
            "typeName": "Director",
            "selections": [
                {"responseName": "name", "fieldName": "name", "fieldType": "String!", "typeKind": "scalar"}
            ]
        }
    ]
}"#;

const MOVIES_PLAN: &str = r#"{
    "nodes": [
        {
            "id": 0,
            "subgraph": "movies",
            "selectionSet": 0,
            "document": "{ movie(id: 1) { id title } movie2: movie(id: 2) { id title } }"
        },
        {
            "id": 1,
            "subgraph": "directors",
            "selectionSet": 1,
            "document": "query($movieId: ID!) { movie(id: $movieId) { director { name } } }",
            "path": ["movie"],
            "requires": ["movieId"],
            "dependencies": [0]
        },
        {
            "id": 2,
            "subgraph": "directors",
            "selectionSet": 2,
            "document": "query($movieId: ID!) { movie(id: $movieId) { director { name } } }",
            "path": ["movie"],
            "requires": ["movieId"],
            "dependencies": [0]
        }
    ],
    "exports": [
        {"selectionSet": 1, "key": "movieId", "path": ["id"]},
        {"selectionSet": 2, "key": "movieId", "path": ["id"]}
    ]
}"#;

fn directors_subgraph() -> MockSubgraph {
    MockSubgraph::new(|request| {
        let movie_id = match request.variables.get("movieId") {
            Some(ValueLiteral::String(id)) => id.as_str(),
            _ => "",
        };
        // Throw on purpose
        if movie_id == "2" {
            return Ok(json!({
                "data": {"movie": null},
                "errors": [{"message": "Director not found for movie with id 2", "path": ["movie"]}]
            }));
        }
        Ok(json!({"data": {"movie": {"director": {"name": "Christopher Nolan"}}}}))
    })
}

#[tokio::test]
async fn error_propagation() {
    let directors = directors_subgraph();
    let requests = directors.requests();
    let gateway = TestGateway::new(MOVIES_OPERATION, MOVIES_PLAN)
        .with_subgraph(
            "movies",
            MockSubgraph::responding(json!({"data": {
                "movie": {"id": "1", "title": "Inception"},
                "movie2": {"id": "2", "title": "Interstellar"}
            }})),
        )
        .with_subgraph("directors", directors)
        .include_subgraph_name();

    let response = gateway.execute().await.unwrap();

    let mut requests = requests.lock().unwrap().clone();
    requests.sort();
    assert_eq!(requests, vec![r#"{"movieId":"1"}"#, r#"{"movieId":"2"}"#]);

    let response: sonic_rs::Value = sonic_rs::from_str(&response).unwrap();
    let errors = response.get("errors").unwrap();
    assert_eq!(errors.as_array().map(|errors| errors.len()), Some(1));
    let error = errors.get(0usize).unwrap();
    assert_eq!(error.get("path"), Some(&json!(["movie2"])));
    assert_eq!(
        error.get("message").and_then(|message| message.as_str()),
        Some("Director not found for movie with id 2")
    );
    let extensions = error.get("extensions").unwrap();
    assert_eq!(
        extensions.get("code").and_then(|code| code.as_str()),
        Some("DOWNSTREAM_SERVICE_ERROR")
    );
    assert_eq!(
        extensions.get("serviceName").and_then(|name| name.as_str()),
        Some("directors")
    );
    insta::assert_snapshot!(
        sonic_rs::to_string(response.get("data").unwrap()).unwrap(),
        @r#"{"movie":{"id":"1","title":"Inception","director":{"name":"Christopher Nolan"}},"movie2":{"id":"2","title":"Interstellar","director":null}}"#
    );
}

#[tokio::test]
async fn non_null_violation_nullifies_nearest_nullable_ancestor() {
    let gateway = TestGateway::new(MOVIES_OPERATION, MOVIES_PLAN)
        .with_subgraph(
            "movies",
            MockSubgraph::responding(json!({"data": {
                "movie": {"id": "1"},
                "movie2": {"id": "2", "title": "Interstellar"}
            }})),
        )
        .with_subgraph(
            "directors",
            MockSubgraph::responding(
                json!({"data": {"movie": {"director": {"name": "Christopher Nolan"}}}}),
            ),
        );

    let response = gateway.execute().await.unwrap();

    insta::assert_snapshot!(
        response,
        @r#"{"data":{"movie":null,"movie2":{"id":"2","title":"Interstellar","director":{"name":"Christopher Nolan"}}},"errors":[{"message":"Cannot return null for non-nullable field Movie.title.","path":["movie","title"]}]}"#
    );
}

const MOVIE_OPERATION: &str = r#"{
    "rootSelectionSet": 0,
    "selectionSets": [
        {
            "id": 0,
            "typeName": "Query",
            "selections": [
                {"responseName": "movie", "fieldName": "movie", "fieldType": "Movie", "typeKind": "object", "selectionSets": {"Movie": 1}},
                {"responseName": "other", "fieldName": "other", "fieldType": "Int", "typeKind": "scalar"}
            ]
        },
        {
            "id": 1,
            "typeName": "Movie",
            "selections": [
                {"responseName": "id", "fieldName": "id", "fieldType": "ID!", "typeKind": "scalar", "needsIdReencode": true},
                {"responseName": "title", "fieldName": "title", "fieldType": "String!", "typeKind": "scalar"}
            ]
        }
    ]
}"#;

const MOVIE_PLAN: &str = r#"{
    "nodes": [
        {"id": 0, "subgraph": "movies", "selectionSet": 0, "document": "{ movie { id title } other }"}
    ]
}"#;

#[tokio::test]
async fn null_field_reports_the_error_below_it() {
    let movies = || {
        MockSubgraph::responding(json!({
            "data": {"movie": null, "other": 1},
            "errors": [{"message": "title resolver failed", "path": ["movie", "title"]}]
        }))
    };

    let gateway = TestGateway::new(MOVIE_OPERATION, MOVIE_PLAN).with_subgraph("movies", movies());
    insta::assert_snapshot!(
        gateway.execute().await.unwrap(),
        @r#"{"data":{"movie":null,"other":1},"errors":[{"message":"title resolver failed","path":["movie"],"extensions":{"code":"DOWNSTREAM_SERVICE_ERROR"}}]}"#
    );

    // the subgraph error explains the null, no violation error is generated
    let operation = MOVIE_OPERATION.replace(r#""fieldType": "Movie""#, r#""fieldType": "Movie!""#);
    let gateway = TestGateway::new(&operation, MOVIE_PLAN).with_subgraph("movies", movies());
    insta::assert_snapshot!(
        gateway.execute().await.unwrap(),
        @r#"{"data":null,"errors":[{"message":"title resolver failed","path":["movie"],"extensions":{"code":"DOWNSTREAM_SERVICE_ERROR"}}]}"#
    );
}

#[tokio::test]
async fn id_that_cannot_be_reencoded_nullifies_the_field() {
    let gateway = TestGateway::new(MOVIE_OPERATION, MOVIE_PLAN).with_subgraph(
        "movies",
        MockSubgraph::responding(json!({"data": {
            "movie": {"id": true, "title": "x"},
            "other": 1
        }})),
    );

    let response = gateway.execute().await.unwrap();

    insta::assert_snapshot!(
        response,
        @r#"{"data":{"movie":null,"other":1},"errors":[{"message":"Ids must be strings or numbers, received a boolean","path":["movie","id"]}]}"#
    );
}

#[tokio::test]
async fn error_anchored_at_a_field_is_kept_next_to_its_value() {
    let gateway = TestGateway::new(MOVIE_OPERATION, MOVIE_PLAN).with_subgraph(
        "movies",
        MockSubgraph::responding(json!({
            "data": {"movie": {"id": "123", "title": "Heat"}, "other": 1},
            "errors": [{"message": "movie is partially stale", "path": ["movie"]}]
        })),
    );

    let response = gateway.execute().await.unwrap();

    insta::assert_snapshot!(
        response,
        @r#"{"data":{"movie":{"id":"TW92aWU6MTIz","title":"Heat"},"other":1},"errors":[{"message":"movie is partially stale","path":["movie"],"extensions":{"code":"DOWNSTREAM_SERVICE_ERROR"}}]}"#
    );
}

const PRODUCTS_OPERATION: &str = r#"{
    "rootSelectionSet": 0,
    "selectionSets": [
        {
            "id": 0,
            "typeName": "Query",
            "selections": [
                {"responseName": "products", "fieldName": "products", "fieldType": "[Product!]", "typeKind": "object", "selectionSets": {"Product": 1}}
            ]
        },
        {
            "id": 1,
            "typeName": "Product",
            "selections": [
                {"responseName": "v", "fieldName": "v", "fieldType": "Int", "typeKind": "scalar"}
            ]
        }
    ]
}"#;

const PRODUCTS_PLAN: &str = r#"{
    "nodes": [
        {"id": 0, "subgraph": "catalog", "selectionSet": 0, "document": "{ products { v } }"}
    ]
}"#;

#[tokio::test]
async fn null_item_in_non_null_list_aborts_the_list() {
    let gateway = TestGateway::new(PRODUCTS_OPERATION, PRODUCTS_PLAN).with_subgraph(
        "catalog",
        MockSubgraph::responding(json!({"data": {"products": [{"v": 1}, null, {"v": 3}]}})),
    );

    let response = gateway.execute().await.unwrap();

    insta::assert_snapshot!(
        response,
        @r#"{"data":{"products":null},"errors":[{"message":"Cannot return null for non-nullable field Query.products.","path":["products",1]}]}"#
    );
}

#[tokio::test]
async fn list_items_keep_their_order() {
    let gateway = TestGateway::new(PRODUCTS_OPERATION, PRODUCTS_PLAN).with_subgraph(
        "catalog",
        MockSubgraph::responding(json!({"data": {"products": [{"v": 1}, {"v": null}, {"v": 3}]}})),
    );

    let response = gateway.execute().await.unwrap();

    insta::assert_snapshot!(
        response,
        @r#"{"data":{"products":[{"v":1},{"v":null},{"v":3}]}}"#
    );
}

const INVENTORY_OPERATION: &str = r#"{
    "rootSelectionSet": 0,
    "selectionSets": [
        {
            "id": 0,
            "typeName": "Query",
            "selections": [
                {"responseName": "products", "fieldName": "products", "fieldType": "[Product!]!", "typeKind": "object", "selectionSets": {"Product": 1}}
            ]
        },
        {
            "id": 1,
            "typeName": "Product",
            "selections": [
                {"responseName": "id", "fieldName": "id", "fieldType": "ID!", "typeKind": "scalar"},
                {"responseName": "stock", "fieldName": "stock", "fieldType": "Int", "typeKind": "scalar"}
            ]
        }
    ]
}"#;

const INVENTORY_PLAN: &str = r#"{
    "nodes": [
        {"id": 0, "subgraph": "catalog", "selectionSet": 0, "document": "{ products { id } }"},
        {
            "id": 1,
            "subgraph": "inventory",
            "selectionSet": 1,
            "document": "query($productId: ID!) { product(id: $productId) { stock } }",
            "path": ["product"],
            "requires": ["productId"],
            "dependencies": [0]
        }
    ],
    "exports": [
        {"selectionSet": 1, "key": "productId", "path": ["id"]}
    ]
}"#;

#[tokio::test]
async fn deferred_list_items_are_fetched_one_by_one() {
    let inventory = MockSubgraph::new(|request| {
        match request.variables.get("productId") {
            Some(ValueLiteral::String(id)) if id == "p2" => Ok(json!({
                "data": {"product": {"stock": null}},
                "errors": [{"message": "stock unavailable", "path": ["product", "stock"]}]
            })),
            Some(ValueLiteral::String(id)) if id == "p1" => {
                Ok(json!({"data": {"product": {"stock": 10}}}))
            }
            _ => Ok(json!({"data": {"product": {"stock": 30}}})),
        }
    })
    .with_delay(Duration::from_millis(5));
    let requests = inventory.requests();
    let gateway = TestGateway::new(INVENTORY_OPERATION, INVENTORY_PLAN)
        .with_subgraph(
            "catalog",
            MockSubgraph::responding(
                json!({"data": {"products": [{"id": "p1"}, {"id": "p2"}, {"id": "p3"}]}}),
            ),
        )
        .with_subgraph("inventory", inventory);

    let response = gateway.execute().await.unwrap();

    let mut requests = requests.lock().unwrap().clone();
    requests.sort();
    assert_eq!(
        requests,
        vec![
            r#"{"productId":"p1"}"#,
            r#"{"productId":"p2"}"#,
            r#"{"productId":"p3"}"#
        ]
    );
    insta::assert_snapshot!(
        response,
        @r#"{"data":{"products":[{"id":"p1","stock":10},{"id":"p2","stock":null},{"id":"p3","stock":30}]},"errors":[{"message":"stock unavailable","path":["products",1,"stock"],"extensions":{"code":"DOWNSTREAM_SERVICE_ERROR"}}]}"#
    );
}

const SPLIT_ROOT_OPERATION: &str = r#"{
    "rootSelectionSet": 0,
    "selectionSets": [
        {
            "id": 0,
            "typeName": "Query",
            "selections": [
                {"responseName": "me", "fieldName": "me", "fieldType": "User", "typeKind": "object", "selectionSets": {"User": 1}},
                {"responseName": "topProducts", "fieldName": "topProducts", "fieldType": "[String!]!", "typeKind": "scalar"}
            ]
        },
        {
            "id": 1,
            "typeName": "User",
            "selections": [
                {"responseName": "name", "fieldName": "name", "fieldType": "String", "typeKind": "scalar"}
            ]
        }
    ]
}"#;

const SPLIT_ROOT_PLAN: &str = r#"{
    "nodes": [
        {"id": 0, "subgraph": "accounts", "selectionSet": 0, "document": "{ me { name } }", "responseNames": ["me"]},
        {"id": 1, "subgraph": "catalog", "selectionSet": 0, "document": "{ topProducts }", "responseNames": ["topProducts"]}
    ]
}"#;

#[tokio::test]
async fn transport_failure_only_nullifies_owned_fields() {
    let gateway = TestGateway::new(SPLIT_ROOT_OPERATION, SPLIT_ROOT_PLAN)
        .with_subgraph(
            "accounts",
            MockSubgraph::failing(SubgraphExecutorError::RequestFailure(
                "http://accounts:4001/graphql".to_string(),
                "connection refused".to_string(),
            )),
        )
        .with_subgraph(
            "catalog",
            MockSubgraph::responding(json!({"data": {"topProducts": ["Table", "Chair"]}})),
        );

    let response = gateway.execute().await.unwrap();

    insta::assert_snapshot!(
        response,
        @r#"{"data":{"me":null,"topProducts":["Table","Chair"]},"errors":[{"message":"Failed to execute request to subgraph","path":["me"],"extensions":{"code":"SUBGRAPH_REQUEST_FAILURE"}}]}"#
    );
}

#[tokio::test]
async fn null_reaching_the_root_nullifies_data() {
    let operation = SPLIT_ROOT_OPERATION.replace(r#""fieldType": "User""#, r#""fieldType": "User!""#);
    let gateway = TestGateway::new(&operation, SPLIT_ROOT_PLAN)
        .with_subgraph(
            "accounts",
            MockSubgraph::failing(SubgraphExecutorError::UnexpectedStatus(
                "http://accounts:4001/graphql".to_string(),
                503,
            )),
        )
        .with_subgraph(
            "catalog",
            MockSubgraph::responding(json!({"data": {"topProducts": ["Table"]}})),
        )
        .include_subgraph_name();

    let response = gateway.execute().await.unwrap();

    insta::assert_snapshot!(
        response,
        @r#"{"data":null,"errors":[{"message":"Failed to execute request to subgraph","path":["me"],"extensions":{"code":"SUBGRAPH_REQUEST_FAILURE","serviceName":"accounts"}}]}"#
    );
}

const FAN_OUT_OPERATION: &str = r#"{
    "rootSelectionSet": 0,
    "selectionSets": [
        {
            "id": 0,
            "typeName": "Query",
            "selections": [
                {"responseName": "a", "fieldName": "a", "fieldType": "Int", "typeKind": "scalar"},
                {"responseName": "b", "fieldName": "b", "fieldType": "Int", "typeKind": "scalar"},
                {"responseName": "c", "fieldName": "c", "fieldType": "Int", "typeKind": "scalar"}
            ]
        }
    ]
}"#;

const FAN_OUT_PLAN: &str = r#"{
    "nodes": [
        {"id": 0, "subgraph": "a", "selectionSet": 0, "document": "{ a }", "responseNames": ["a"]},
        {"id": 1, "subgraph": "b", "selectionSet": 0, "document": "{ b }", "responseNames": ["b"]},
        {"id": 2, "subgraph": "c", "selectionSet": 0, "document": "{ c }", "responseNames": ["c"]}
    ]
}"#;

async fn execute_fan_out(delays: [u64; 3]) -> String {
    TestGateway::new(FAN_OUT_OPERATION, FAN_OUT_PLAN)
        .with_subgraph(
            "a",
            MockSubgraph::responding(json!({"data": {"a": 1}}))
                .with_delay(Duration::from_millis(delays[0])),
        )
        .with_subgraph(
            "b",
            MockSubgraph::responding(json!({
                "data": {"b": null},
                "errors": [{"message": "b failed", "path": ["b"]}]
            }))
            .with_delay(Duration::from_millis(delays[1])),
        )
        .with_subgraph(
            "c",
            MockSubgraph::responding(json!({
                "data": {"c": null},
                "errors": [{"message": "c failed", "path": ["c"]}]
            }))
            .with_delay(Duration::from_millis(delays[2])),
        )
        .execute()
        .await
        .unwrap()
}

#[tokio::test]
async fn concurrent_fetches_compose_deterministically() {
    let first = execute_fan_out([30, 10, 20]).await;
    let second = execute_fan_out([10, 20, 30]).await;
    let third = execute_fan_out([20, 30, 10]).await;

    assert_eq!(first, second);
    assert_eq!(second, third);
    insta::assert_snapshot!(
        first,
        @r#"{"data":{"a":1,"b":null,"c":null},"errors":[{"message":"b failed","path":["b"],"extensions":{"code":"DOWNSTREAM_SERVICE_ERROR"}},{"message":"c failed","path":["c"],"extensions":{"code":"DOWNSTREAM_SERVICE_ERROR"}}]}"#
    );
}

const SEARCH_OPERATION: &str = r#"{
    "rootSelectionSet": 0,
    "selectionSets": [
        {
            "id": 0,
            "typeName": "Query",
            "selections": [
                {"responseName": "search", "fieldName": "search", "fieldType": "[SearchResult!]!", "typeKind": "union", "selectionSets": {"User": 1, "Organization": 2}}
            ]
        },
        {
            "id": 1,
            "typeName": "User",
            "selections": [
                {"responseName": "__typename", "fieldName": "__typename", "fieldType": "String!", "typeKind": "scalar"},
                {"responseName": "id", "fieldName": "id", "fieldType": "ID!", "typeKind": "scalar", "needsIdReencode": true},
                {"responseName": "name", "fieldName": "name", "fieldType": "String", "typeKind": "scalar"}
            ]
        },
        {
            "id": 2,
            "typeName": "Organization",
            "selections": [
                {"responseName": "__typename", "fieldName": "__typename", "fieldType": "String!", "typeKind": "scalar"},
                {"responseName": "title", "fieldName": "title", "fieldType": "String", "typeKind": "scalar"}
            ]
        }
    ]
}"#;

const SEARCH_PLAN: &str = r#"{
    "nodes": [
        {"id": 0, "subgraph": "accounts", "selectionSet": 0, "document": "{ search { __typename ... on AccountUser { id name } ... on Organization { title } } }"}
    ]
}"#;

#[tokio::test]
async fn abstract_types_resolve_through_type_mappings() {
    let gateway = TestGateway::new(SEARCH_OPERATION, SEARCH_PLAN)
        .with_subgraph(
            "accounts",
            MockSubgraph::responding(json!({"data": {"search": [
                {"__typename": "AccountUser", "id": "1", "name": "Ada"},
                {"__typename": "Organization", "title": "ACME"},
                {"__typename": "AccountUser", "id": 7, "name": null}
            ]}})),
        )
        .with_type_mapping("accounts", "AccountUser", "User");

    let response = gateway.execute().await.unwrap();

    insta::assert_snapshot!(
        response,
        @r#"{"data":{"search":[{"__typename":"User","id":"VXNlcjox","name":"Ada"},{"__typename":"Organization","title":"ACME"},{"__typename":"User","id":"VXNlcjo3","name":null}]}}"#
    );
}

#[tokio::test]
async fn abstract_value_without_typename_is_fatal() {
    let gateway = TestGateway::new(SEARCH_OPERATION, SEARCH_PLAN).with_subgraph(
        "accounts",
        MockSubgraph::responding(json!({"data": {"search": [{"id": "1"}]}})),
    );

    assert_eq!(
        gateway.execute().await,
        Err(ExecutionError::MissingTypeName("SearchResult".to_string()))
    );
}

#[tokio::test]
async fn excluded_selections_and_typename_need_no_fetch() {
    let operation = r#"{
        "rootSelectionSet": 0,
        "selectionSets": [
            {
                "id": 0,
                "typeName": "Query",
                "selections": [
                    {"responseName": "__typename", "fieldName": "__typename", "fieldType": "String!", "typeKind": "scalar"},
                    {"responseName": "hello", "fieldName": "hello", "fieldType": "String!", "typeKind": "scalar", "include": {"include": "withHello"}},
                    {"responseName": "bye", "fieldName": "bye", "fieldType": "String!", "typeKind": "scalar", "include": {"skip": true}}
                ]
            }
        ]
    }"#;
    let gateway =
        TestGateway::new(operation, r#"{"nodes": []}"#).with_variables(r#"{"withHello": false}"#);

    let response = gateway.execute().await.unwrap();

    insta::assert_snapshot!(response, @r#"{"data":{"__typename":"Query"}}"#);
}

#[tokio::test]
async fn cancellation_aborts_in_flight_fetches() {
    let gateway = TestGateway::new(FAN_OUT_OPERATION, FAN_OUT_PLAN)
        .with_subgraph(
            "a",
            MockSubgraph::responding(json!({"data": {"a": 1}})).with_delay(Duration::from_secs(5)),
        )
        .with_subgraph("b", MockSubgraph::responding(json!({"data": {"b": 2}})))
        .with_subgraph("c", MockSubgraph::responding(json!({"data": {"c": 3}})));

    let cancellation = CancellationToken::new();
    let trigger = cancellation.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    assert_eq!(
        gateway.execute_with(cancellation).await,
        Err(ExecutionError::Cancelled)
    );
}

#[tokio::test]
async fn deadline_aborts_execution() {
    let gateway = TestGateway::new(PRODUCTS_OPERATION, PRODUCTS_PLAN).with_subgraph(
        "catalog",
        MockSubgraph::responding(json!({"data": {"products": []}}))
            .with_delay(Duration::from_secs(5)),
    );

    assert_eq!(
        gateway
            .execute_with(CancellationToken::with_timeout(Duration::from_millis(20)))
            .await,
        Err(ExecutionError::TimedOut)
    );
}

#[tokio::test]
async fn registering_work_for_a_consumed_selection_set_fails() {
    // node 1 populates the movie but does not wait for the fetch that finds it
    let plan = MOVIES_PLAN.replace(r#""dependencies": [0]"#, r#""dependencies": []"#);
    let gateway = TestGateway::new(MOVIES_OPERATION, &plan)
        .with_subgraph(
            "movies",
            MockSubgraph::responding(json!({"data": {
                "movie": {"id": "1", "title": "Inception"},
                "movie2": {"id": "2", "title": "Interstellar"}
            }})),
        )
        .with_subgraph("directors", directors_subgraph());

    assert!(matches!(
        gateway.execute().await,
        Err(ExecutionError::ImmutableSelectionSet(_))
    ));
}

#[tokio::test]
async fn dependency_on_a_missing_node_is_rejected() {
    let plan = MOVIES_PLAN.replace(r#""dependencies": [0]"#, r#""dependencies": [7]"#);
    let gateway = TestGateway::new(MOVIES_OPERATION, &plan);

    assert_eq!(
        gateway.execute().await,
        Err(ExecutionError::UnknownNode(NodeId(7)))
    );
}

#[tokio::test]
async fn subscriptions_stream_through_the_context() {
    let gateway = TestGateway::new(MOVIES_OPERATION, MOVIES_PLAN).with_subgraph(
        "movies",
        MockSubgraph::responding(json!({"data": {"movieAdded": {"id": "9"}}})),
    );

    let responses = gateway
        .subscribe("movies", "subscription { movieAdded { id } }")
        .await
        .unwrap();
    assert_eq!(responses.len(), 1);
    assert_eq!(
        responses[0].data(),
        &json!({"movieAdded": {"id": "9"}})
    );

    assert_eq!(
        gateway.subscribe("reviews", "subscription { a }").await.unwrap_err(),
        SubgraphExecutorError::SubgraphNotFound("reviews".to_string())
    );
}
