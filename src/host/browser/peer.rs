//! Peer-connection session for candidate discovery
//!
//! ```text
//! RTCPeerConnection ─ onicecandidate ─> mpsc ─> PeerSession::candidates()
//!        ^                                            │ drop
//!        └───────────── close() <──── release hook <──┘
//! ```

use futures::channel::mpsc;
use futures::StreamExt;
use js_sys::{Array, Object, Reflect};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{RtcConfiguration, RtcPeerConnection, RtcPeerConnectionIceEvent, RtcSessionDescriptionInit};

use super::BrowserHost;
use crate::error::HostError;
use crate::host::{PeerHost, PeerSession};

impl PeerHost for BrowserHost {
    fn open_peer_session(&self, stun_server: &str) -> Result<PeerSession, HostError> {
        let rtc_err = |e: JsValue| HostError::from_js("RTCPeerConnection", e);

        let config = RtcConfiguration::new();
        let ice_servers = Array::new();
        let stun = Object::new();
        Reflect::set(&stun, &"urls".into(), &JsValue::from_str(stun_server)).map_err(rtc_err)?;
        ice_servers.push(&stun);
        config.set_ice_servers(&ice_servers);

        let pc = RtcPeerConnection::new_with_configuration(&config).map_err(rtc_err)?;

        // Candidate gathering only starts once there is something to negotiate
        let _channel = pc.create_data_channel("");

        let (tx, rx) = mpsc::unbounded::<String>();
        let on_candidate = {
            let tx = tx.clone();
            Closure::wrap(Box::new(move |event: JsValue| {
                let event: RtcPeerConnectionIceEvent = event.unchecked_into();
                match event.candidate() {
                    Some(candidate) => {
                        let _ = tx.unbounded_send(candidate.candidate());
                    }
                    // null candidate: gathering complete
                    None => tx.close_channel(),
                }
            }) as Box<dyn FnMut(JsValue)>)
        };
        pc.set_onicecandidate(Some(on_candidate.as_ref().unchecked_ref()));

        {
            let pc = pc.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let negotiated = async {
                    let offer = JsFuture::from(pc.create_offer()).await?;
                    let offer: RtcSessionDescriptionInit = offer.unchecked_into();
                    JsFuture::from(pc.set_local_description(&offer)).await
                }
                .await;
                if let Err(e) = negotiated {
                    log::debug!("network: local offer failed: {:?}", e);
                    tx.close_channel();
                }
            });
        }

        let release = Box::new(move || {
            pc.set_onicecandidate(None);
            pc.close();
            drop(on_candidate);
            log::debug!("network: peer connection closed");
        });

        Ok(PeerSession::new(rx.boxed_local(), release))
    }
}
