use std::{convert::Infallible, sync::Arc};

use wrapp_lifecycle::{component_info, Component, DynComponent, Resolved, Scope};

fn main() {
    let scope = Scope::new();
    let server = server(&scope);

    let started = futures::executor::block_on(server.init()).unwrap();
    println!("{:?}", started);
    println!("{:?}", scope);

    futures::executor::block_on(scope.destroy()).unwrap();
    println!("{:?}", scope)
}

#[derive(Debug)]
struct Config {
    url: String,
}

#[derive(Debug)]
struct Database {
    config: Arc<Config>,
}

#[derive(Debug)]
struct Server {
    db: Arc<Database>,
    config: Arc<Config>,
}

fn config(scope: &Scope) -> Component<Config> {
    scope.cached(
        Component::builder(component_info!("config")).create(|_: Resolved| async {
            Ok::<_, Infallible>(Config {
                url: "postgres://localhost".to_string(),
            })
        }),
    )
}

fn database(scope: &Scope) -> Component<Database> {
    let weak = scope.downgrade();
    scope.cached(
        Component::builder(component_info!("database"))
            .dependencies_with(move || weak.with(|scope| vec![config(scope).erase()]))
            .destroy(|db: Arc<Database>| async move {
                println!("closing connection to {}", db.config.url);
                Ok::<_, Infallible>(())
            })
            .create(|deps: Resolved| async move {
                Ok::<_, wrapp_lifecycle::ResolveError>(Database {
                    config: deps.get(0)?,
                })
            }),
    )
}

fn server(scope: &Scope) -> Component<Server> {
    let deps: Vec<DynComponent> = vec![database(scope).erase(), config(scope).erase()];
    scope.cached(
        Component::builder(component_info!("server"))
            .dependencies_with(move || deps.clone())
            .destroy(|_: Arc<Server>| async {
                println!("stopping server");
                Ok::<_, Infallible>(())
            })
            .create(|deps: Resolved| async move {
                let (db, config) = deps.extract()?;
                Ok::<_, wrapp_lifecycle::ResolveError>(Server { db, config })
            }),
    )
}
