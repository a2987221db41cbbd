/*  This file is part of hps-conditions, the conditions database layer of the HPS experiment software.
    Copyright in each year of 2013-2015 inclusive, and 2026, the HPS Collaboration.
    hps-conditions is free software, distributed under the GNU Affero General Public License as published by
    the Free Software Foundation; see the file LICENSE for license version and details.
    hps-conditions is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
    You should have received a copy of the GNU Affero General Public License along with hps-conditions.  If not, see <http://www.gnu.org/licenses/>
*/
//! Calorimeter (ECal) per-channel calibration tables.
use crate::error::ConditionsError;
use crate::model::conditions_object::{
    ConditionsObject, ConditionsObjectCollection, FieldValues, ObjectCollection,
};
use crate::model::converter::DatabaseConditionsConverter;

/// Gain of one crystal channel.
#[derive(Debug, Clone, PartialEq)]
pub struct EcalGain {
    pub id: i64,
    pub channel_id: i32,
    pub gain: f64,
}

impl ConditionsObject for EcalGain {
    fn from_fields(fields: &FieldValues<'_>) -> Result<Self, ConditionsError> {
        Ok(EcalGain {
            id: fields.row_id()?,
            channel_id: fields.get_i32("ecal_channel_id")?,
            gain: fields.get_f64("gain")?,
        })
    }

    fn row_id(&self) -> i64 {
        self.id
    }
}

/// Pedestal and noise of one crystal channel, in ADC counts.
#[derive(Debug, Clone, PartialEq)]
pub struct EcalCalibration {
    pub id: i64,
    pub channel_id: i32,
    pub pedestal: f64,
    pub noise: f64,
}

impl ConditionsObject for EcalCalibration {
    fn from_fields(fields: &FieldValues<'_>) -> Result<Self, ConditionsError> {
        Ok(EcalCalibration {
            id: fields.row_id()?,
            channel_id: fields.get_i32("ecal_channel_id")?,
            pedestal: fields.get_f64("pedestal")?,
            noise: fields.get_f64("noise")?,
        })
    }

    fn row_id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EcalBadChannel {
    pub id: i64,
    pub channel_id: i32,
}

impl ConditionsObject for EcalBadChannel {
    fn from_fields(fields: &FieldValues<'_>) -> Result<Self, ConditionsError> {
        Ok(EcalBadChannel {
            id: fields.row_id()?,
            channel_id: fields.get_i32("ecal_channel_id")?,
        })
    }

    fn row_id(&self) -> i64 {
        self.id
    }
}

pub type EcalGainCollection = ObjectCollection<EcalGain>;
pub type EcalCalibrationCollection = ObjectCollection<EcalCalibration>;
pub type EcalBadChannelCollection = ObjectCollection<EcalBadChannel>;

pub type EcalGainConverter = DatabaseConditionsConverter<EcalGainCollection>;
pub type EcalCalibrationConverter = DatabaseConditionsConverter<EcalCalibrationCollection>;
pub type EcalBadChannelConverter = DatabaseConditionsConverter<EcalBadChannelCollection>;

impl ObjectCollection<EcalGain> {
    pub fn find_by_channel(&self, channel_id: i32) -> Option<&EcalGain> {
        self.iter().find(|g| g.channel_id == channel_id)
    }
}

impl ObjectCollection<EcalCalibration> {
    pub fn find_by_channel(&self, channel_id: i32) -> Option<&EcalCalibration> {
        self.iter().find(|c| c.channel_id == channel_id)
    }
}

impl ObjectCollection<EcalBadChannel> {
    pub fn is_bad(&self, channel_id: i32) -> bool {
        self.iter().any(|c| c.channel_id == channel_id)
    }
}
