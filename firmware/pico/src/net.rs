use cyw43::{Control, JoinOptions};
use defmt::*;
use embassy_executor::Spawner;
use embassy_net::tcp::TcpSocket;
use embassy_net::{Config as NetConfig, DhcpConfig, Stack, StackResources};
use embassy_time::{Duration, Timer};
use embedded_io_async::Write as _;
use static_cell::StaticCell;

use picostatus_core::{request_preview, ConnectionHandler, HandlerAction, HardwarePort};

use crate::sensors::BoardSensors;
use crate::{WIFI_PSK, WIFI_SSID};

const HTTP_PORT: u16 = 80;
// One HTTP socket plus the DHCP client.
const SOCKET_COUNT: usize = 3;
const SOCKET_BUF_LEN: usize = 1024;
// Matches the socket's inbound buffer: one receive event never hands the
// handler more than this.
const REQUEST_BUF_LEN: usize = 1024;
/// Join attempts before the boot sequence is abandoned.
const JOIN_ATTEMPTS: u32 = 10;
const JOIN_RETRY_DELAY: Duration = Duration::from_secs(2);
// Idle guard for peers that neither send nor close; see DESIGN.md.
const SOCKET_TIMEOUT: Duration = Duration::from_secs(10);

static NET_RESOURCES: StaticCell<StackResources<SOCKET_COUNT>> = StaticCell::new();

/// Bring the network up and leave the HTTP responder running.
///
/// Startup failures are fatal: if the association never succeeds within the
/// bounded retry budget the boot panics and halts. Once the responder is
/// spawned there is no error path that stops serving.
pub async fn start(
    spawner: Spawner,
    net_device: cyw43::NetDriver<'static>,
    mut control: Control<'static>,
    seed: u64,
    board: BoardSensors,
) {
    let config = NetConfig::dhcpv4(DhcpConfig::default());
    let resources = NET_RESOURCES.init(StackResources::new());
    let (stack, runner) = embassy_net::new(net_device, config, resources, seed);
    spawner.must_spawn(net_task(runner));

    info!("joining Wi-Fi network \"{}\"", WIFI_SSID);
    let mut attempts: u32 = 0;
    loop {
        match control
            .join(WIFI_SSID, JoinOptions::new(WIFI_PSK.as_bytes()))
            .await
        {
            Ok(()) => break,
            Err(err) => {
                attempts += 1;
                warn!(
                    "Wi-Fi join failed (attempt {}/{}): status={}",
                    attempts, JOIN_ATTEMPTS, err.status
                );
                if attempts >= JOIN_ATTEMPTS {
                    defmt::panic!("Wi-Fi association failed; aborting boot");
                }
                Timer::after(JOIN_RETRY_DELAY).await;
            }
        }
    }
    info!("Wi-Fi associated");

    stack.wait_config_up().await;
    if let Some(cfg) = stack.config_v4() {
        info!("device IP: {}", cfg.address.address());
    }

    spawner.must_spawn(http_responder(stack, board));
}

#[embassy_executor::task]
async fn net_task(mut runner: embassy_net::Runner<'static, cyw43::NetDriver<'static>>) -> ! {
    runner.run().await
}

/// Single-connection HTTP responder.
///
/// One task owns the listening socket, so at most one request is in flight at
/// a time; further connection attempts wait in the transport until the next
/// accept.
#[embassy_executor::task]
async fn http_responder(stack: Stack<'static>, board: BoardSensors) -> ! {
    let mut rx_buf = [0u8; SOCKET_BUF_LEN];
    let mut tx_buf = [0u8; SOCKET_BUF_LEN];
    let mut handler = ConnectionHandler::new(board);

    info!("listening on port {}", HTTP_PORT);

    loop {
        let mut socket = TcpSocket::new(stack, &mut rx_buf, &mut tx_buf);
        socket.set_timeout(Some(SOCKET_TIMEOUT));

        if let Err(err) = socket.accept(HTTP_PORT).await {
            warn!("accept error: {:?}", err);
            Timer::after(Duration::from_millis(200)).await;
            continue;
        }

        info!("connection from {:?}", socket.remote_endpoint());

        if let Err(err) = serve_connection(&mut socket, &mut handler).await {
            warn!("connection error: {:?}", err);
        }

        socket.abort();
    }
}

/// Drive one accepted connection through the core state machine.
///
/// Each receive event performs exactly one handler transition: a non-empty
/// payload is answered with the status page and the connection stays open;
/// only a zero-length receive (peer close) ends it.
async fn serve_connection<P: HardwarePort>(
    socket: &mut TcpSocket<'_>,
    handler: &mut ConnectionHandler<P>,
) -> Result<(), embassy_net::tcp::Error> {
    let mut buf = [0u8; REQUEST_BUF_LEN];

    loop {
        let n = socket.read(&mut buf).await?;

        {
            // Scoped logging copy, dropped before the response is written.
            let preview = request_preview(&buf[..n]);
            debug!("request: {}", preview.as_str());
        }

        match handler.on_data(&buf[..n]) {
            Ok(HandlerAction::Respond(page)) => {
                socket.write_all(page.as_bytes()).await?;
                socket.flush().await?;
            }
            Ok(HandlerAction::Close) => {
                debug!("peer closed; closing connection");
                socket.close();
                return Ok(());
            }
            Err(err) => {
                // Capacity overflow cannot occur for any snapshot; drop the
                // connection rather than send a truncated page.
                error!("render failed: {:?}", err);
                return Ok(());
            }
        }
    }
}
