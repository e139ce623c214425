//! End-to-end checks of generic resolution, overloads, repeated parameters,
//! authenticator ordering and hot reload.

use std::sync::{Arc, Mutex};
use std::thread;

use apiary::contract::{HierarchyReader, ParameterKind};
use apiary::core::fixtures::{self, Greeting, GreetingStore};
use apiary::core::ScalarKind;
use apiary::prelude::*;
use apiary::runtime::RegistryError;
use bytes::Bytes;

fn long() -> TypeRef {
    TypeRef::primitive(Primitive::Long)
}

fn empty() -> DispatchContext {
    DispatchContext::new(HeaderMap::new(), Bytes::new())
}

#[test]
fn inherited_generic_method_resolves_against_the_leaf() {
    let classes = fixtures::generic_hierarchy();
    let leaf = HierarchyReader::new(&classes).read("Leaf").unwrap();

    let chains: Vec<_> = leaf.chains_named("get").collect();
    assert_eq!(chains.len(), 1);
    let get = chains[0].leaf();
    assert_eq!(get.returns, TypeRef::class("String"));
    assert_eq!(get.params, vec![long()]);
    assert_eq!(get.declaring.name, "Base");
}

#[test]
fn scalar_return_of_inherited_method_fails_the_build() {
    let errors = ContractBuilder::new(fixtures::generic_hierarchy())
        .service("Leaf")
        .build()
        .unwrap_err();
    assert!(errors
        .iter()
        .any(|e| matches!(e, ContractError::InvalidReturnType { ty, .. } if ty == "String")));
}

#[test]
fn sibling_overloads_are_never_silently_merged() {
    let finder = ClassDef::concrete("Finder")
        .api(ApiFragment::named("finder", "v1"))
        .method(
            MethodDef::new("foo")
                .param(ParamDef::named("value", TypeRef::class("String")))
                .returns(TypeRef::class("Greeting")),
        )
        .method(
            MethodDef::new("foo")
                .param(ParamDef::named("value", TypeRef::class("Long")))
                .returns(TypeRef::class("Greeting")),
        );

    let errors = ContractBuilder::new(fixtures::greeting_index().with(finder))
        .service("Finder")
        .build()
        .unwrap_err();
    let overload = errors
        .iter()
        .find(|e| matches!(e, ContractError::OverloadedMethod { .. }))
        .unwrap()
        .to_string();
    assert!(overload.contains("Finder.foo(String)"));
    assert!(overload.contains("Finder.foo(Long)"));
}

fn batch_service(ids: TypeRef) -> ClassDef {
    ClassDef::concrete("Batch")
        .api(ApiFragment::named("batch", "v1"))
        .method(
            MethodDef::new("insert")
                .param(ParamDef::named("ids", ids))
                .returns(TypeRef::class("Greeting"))
                .invoker(Invoker::new(|_svc: Arc<()>, args: Arguments| async move {
                    let ids: Vec<i64> = args.get(0)?;
                    Ok(Greeting {
                        id: ids.iter().sum(),
                        message: format!("{} ids", ids.len()),
                        color: None,
                    })
                })),
        )
}

#[tokio::test]
async fn array_of_boxed_longs_binds_as_repeated() {
    let apiary = Apiary::builder()
        .classes(fixtures::greeting_index().with(batch_service(TypeRef::array(TypeRef::class("Long")))))
        .service("Batch", ())
        .build()
        .unwrap();

    let contract = apiary.contract("Batch").unwrap();
    let insert = contract.method("batch.insert").unwrap();
    assert_eq!(
        insert.parameters[0].kind,
        ParameterKind::Scalar {
            scalar: ScalarKind::Int64,
            repeated: true
        }
    );

    let mut ctx = empty();
    assert!(
        apiary
            .dispatch(&Method::POST, "/_api/batch/v1/insert?ids=4&ids=5&ids=6", &mut ctx)
            .await
    );
    let created: Greeting = ctx.response().unwrap().json_body().unwrap();
    assert_eq!(created.id, 15);
    assert_eq!(created.message, "3 ids");
}

#[test]
fn array_of_arrays_fails_with_nested_collection() {
    let nested = TypeRef::array(TypeRef::array(TypeRef::class("Long")));
    let err = Apiary::builder()
        .classes(fixtures::greeting_index().with(batch_service(nested)))
        .service("Batch", ())
        .build()
        .unwrap_err();

    let ApiaryError::Contract(errors) = err else {
        panic!("expected a contract error, got {err}");
    };
    assert!(errors
        .iter()
        .any(|e| matches!(e, ContractError::NestedCollection { parameter, .. } if parameter == "ids")));
}

#[tokio::test]
async fn authenticators_run_in_order_until_one_identifies() {
    let mut service = fixtures::greeting_service();
    for method in &mut service.methods {
        if method.name == "remove" {
            method.config.authenticators = Some(vec!["a".to_string(), "b".to_string()]);
        }
    }

    let calls = Arc::new(Mutex::new(Vec::new()));
    let (seen_a, seen_b) = (Arc::clone(&calls), Arc::clone(&calls));
    let apiary = Apiary::builder()
        .classes(fixtures::greeting_index().with(service))
        .service(
            "GreetingService",
            GreetingStore::with_greetings(vec![Greeting {
                id: 1,
                message: "bye".into(),
                color: None,
            }]),
        )
        .authenticator(
            "a",
            FnAuthenticator::new(move |_ctx: &mut AuthenticationContext| {
                seen_a.lock().unwrap().push("a");
                None
            }),
        )
        .authenticator(
            "b",
            FnAuthenticator::new(move |_ctx: &mut AuthenticationContext| {
                seen_b.lock().unwrap().push("b");
                Some(Identity::new("bee"))
            }),
        )
        .build()
        .unwrap();

    let mut ctx = empty();
    apiary
        .dispatch(&Method::DELETE, "/_api/greetings/v1/greeting/remove/1", &mut ctx)
        .await;

    assert_eq!(*calls.lock().unwrap(), vec!["a", "b"]);
    assert_eq!(ctx.identity().unwrap().id, "bee");
    assert_eq!(ctx.state(), DispatchState::Responded);
    assert_eq!(ctx.response().unwrap().status, StatusCode::NO_CONTENT);
}

/// The greeting service with `get` moved to `POST greeting/fetch/{id}`.
fn moved_get_index() -> ClassIndex {
    let mut service = fixtures::greeting_service();
    for method in &mut service.methods {
        if method.name == "get" {
            method.config.path = Some("greeting/fetch/{id}".to_string());
            method.config.http_method = Some(Method::POST);
        }
    }
    fixtures::greeting_index().with(service)
}

fn seeded_store() -> ServiceInstance {
    Arc::new(GreetingStore::with_greetings(vec![Greeting {
        id: 1,
        message: "hello".into(),
        color: None,
    }]))
}

#[tokio::test]
async fn reload_is_visible_to_the_next_dispatch() {
    let apiary = Apiary::builder()
        .classes(fixtures::greeting_index())
        .service_instance("GreetingService", seeded_store())
        .build()
        .unwrap();

    let old_route = "/_api/greetings/v1/greeting/get/1";
    let new_route = "/_api/greetings/v1/greeting/fetch/1";

    let mut ctx = empty();
    assert!(apiary.dispatch(&Method::GET, old_route, &mut ctx).await);
    assert_eq!(ctx.response().unwrap().status, StatusCode::OK);

    apiary
        .reload(moved_get_index(), "GreetingService", seeded_store())
        .unwrap();

    assert!(!apiary.dispatch(&Method::GET, old_route, &mut empty()).await);
    assert!(!apiary.dispatch(&Method::POST, old_route, &mut empty()).await);
    assert!(!apiary.dispatch(&Method::GET, new_route, &mut empty()).await);

    let mut ctx = empty();
    assert!(apiary.dispatch(&Method::POST, new_route, &mut ctx).await);
    let greeting: Greeting = ctx.response().unwrap().json_body().unwrap();
    assert_eq!(greeting.message, "hello");
}

#[test]
fn concurrent_readers_never_see_a_torn_route() {
    let apiary = Apiary::builder()
        .classes(fixtures::greeting_index())
        .service_instance("GreetingService", seeded_store())
        .build()
        .unwrap();
    let registry = Arc::clone(apiary.registry());

    let old_route = "/_api/greetings/v1/greeting/get/1";
    let new_route = "/_api/greetings/v1/greeting/fetch/1";

    thread::scope(|scope| {
        for _ in 0..4 {
            let registry = Arc::clone(&registry);
            scope.spawn(move || {
                for _ in 0..2_000 {
                    let snapshot = registry.snapshot();
                    let old = snapshot.route(&Method::GET, old_route).is_some();
                    let new = snapshot.route(&Method::POST, new_route).is_some();
                    assert!(old != new, "exactly one configuration must be live");
                    assert!(snapshot.route(&Method::POST, old_route).is_none());
                    assert!(snapshot.route(&Method::GET, new_route).is_none());
                }
            });
        }

        for round in 0..40 {
            let classes = if round % 2 == 0 {
                moved_get_index()
            } else {
                fixtures::greeting_index()
            };
            apiary
                .reload(classes, "GreetingService", seeded_store())
                .unwrap();
        }
    });
}

#[test]
fn stale_reload_is_rejected() {
    let apiary = Apiary::builder()
        .classes(fixtures::greeting_index())
        .service_instance("GreetingService", seeded_store())
        .build()
        .unwrap();
    let original = apiary
        .registry()
        .snapshot()
        .registration("GreetingService")
        .cloned()
        .unwrap();

    apiary
        .reload(moved_get_index(), "GreetingService", seeded_store())
        .unwrap();

    let contract = apiary.contract("GreetingService").unwrap();
    let err = apiary
        .registry()
        .replace(&original, &contract, seeded_store())
        .unwrap_err();
    assert!(matches!(err, RegistryError::Stale { .. }));
}

fn farewell_service() -> ClassDef {
    ClassDef::concrete("FarewellService")
        .api(ApiFragment {
            auth_level: Some(AuthLevel::Optional),
            ..ApiFragment::named("greetings", "v1")
        })
        .with_config(ClassFragment {
            resource: Some("farewell".to_string()),
            ..Default::default()
        })
        .method(
            MethodDef::new("wave")
                .returns(TypeRef::class("Greeting"))
                .invoker(Invoker::new(|_svc: Arc<()>, _args: Arguments| async move {
                    Ok(Greeting {
                        id: 0,
                        message: "bye".into(),
                        color: None,
                    })
                })),
        )
}

fn two_services() -> Apiary {
    Apiary::builder()
        .classes(fixtures::greeting_index().with(farewell_service()))
        .service_instance("GreetingService", seeded_store())
        .service("FarewellService", ())
        .build()
        .unwrap()
}

async fn assert_both_services_intact(apiary: &Apiary) {
    let mut ctx = empty();
    assert!(
        apiary
            .dispatch(&Method::GET, "/_api/greetings/v1/farewell/wave", &mut ctx)
            .await
    );
    let wave: Greeting = ctx.response().unwrap().json_body().unwrap();
    assert_eq!(wave.message, "bye");

    let mut ctx = empty();
    assert!(
        apiary
            .dispatch(&Method::GET, "/_api/greetings/v1/greeting/get/1", &mut ctx)
            .await
    );
    assert_eq!(ctx.response().unwrap().status, StatusCode::OK);
}

#[tokio::test]
async fn reload_cannot_take_over_another_services_method() {
    let apiary = two_services();

    let service = fixtures::greeting_service()
        .with_config(ClassFragment {
            resource: Some("farewell".to_string()),
            ..Default::default()
        })
        .method(
            MethodDef::new("wave")
                .returns(TypeRef::class("Greeting"))
                .invoker(Invoker::new(
                    |svc: Arc<GreetingStore>, _args: Arguments| async move { Ok(svc.get(1)?) },
                )),
        );
    let err = apiary
        .reload(
            fixtures::greeting_index().with(farewell_service()).with(service),
            "GreetingService",
            seeded_store(),
        )
        .unwrap_err();

    assert!(matches!(
        err,
        ApiaryError::Registry(RegistryError::DuplicateMethod { ref method, ref first, ref second, .. })
            if method == "greetings.farewell.wave"
                && [first.as_str(), second.as_str()].contains(&"FarewellService")
    ));
    assert_both_services_intact(&apiary).await;
}

#[tokio::test]
async fn reload_cannot_claim_another_services_route() {
    let apiary = two_services();

    let mut service = fixtures::greeting_service();
    for method in &mut service.methods {
        if method.name == "list" {
            method.config.path = Some("farewell/wave".to_string());
        }
    }
    let err = apiary
        .reload(
            fixtures::greeting_index().with(farewell_service()).with(service),
            "GreetingService",
            seeded_store(),
        )
        .unwrap_err();

    assert!(matches!(
        err,
        ApiaryError::Registry(RegistryError::Route(_))
    ));
    assert_both_services_intact(&apiary).await;
}
