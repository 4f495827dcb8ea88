use std::process;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use fluvio_future::task::run_block_on;

use etcd_member_controller::cli::ControllerOpt;
use etcd_member_controller::controller::{MemberController, Reconciler};
use etcd_member_controller::member::EtcdMemberClient;
use etcd_member_controller::pod::K8PodObserver;

fn main() {
    fluvio_future::subscriber::init_logger();

    let opt = ControllerOpt::parse();
    if let Err(err) = run_block_on(run(opt)) {
        error!("{:#?}", err);
        process::exit(1);
    }
}

async fn run(opt: ControllerOpt) -> Result<()> {
    let once = opt.once();
    let config = opt.as_config()?;
    info!(?config, "starting etcd member controller");

    let k8_client = k8_client::load_and_share()?;
    let observer = K8PodObserver::new(k8_client, config.namespace.clone());
    let members = EtcdMemberClient::new(config.etcd_endpoints.clone(), config.request_timeout);
    let reconciler = Reconciler::from_config(observer, members, &config);

    let shutdown = CancellationToken::new();
    let handler_shutdown = shutdown.clone();
    ctrlc::set_handler(move || {
        info!("shutdown requested");
        handler_shutdown.cancel();
    })?;

    let controller = MemberController::new(reconciler, &config, shutdown);
    if once {
        let outcome = controller.sync_once().await?;
        info!(?outcome, "sync finished");
    } else {
        controller.dispatch_loop().await;
    }

    Ok(())
}
